//! Contact field validation.
//!
//! Phone numbers are bare digit strings in Brazilian shape: a two-digit area
//! code followed by either a 9-digit mobile number (leading `9`) or an 8-digit
//! landline number (leading `2`–`8`).

use crate::error::ValidationErrors;
use regex::Regex;
use std::sync::LazyLock;

pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 100;

static PHONE_BR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9]{2}(?:9[0-9]{8}|[2-8][0-9]{7})$").unwrap());

/// Validate a contact name. Returns the trimmed name when valid.
pub fn check_name(name: Option<&str>, errors: &mut ValidationErrors) -> Option<String> {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        errors.push("name", "O nome é obrigatório.");
        return None;
    };
    let len = name.chars().count();
    if len < MIN_NAME_LEN {
        errors.push(
            "name",
            format!("O nome deve ter pelo menos {MIN_NAME_LEN} caracteres."),
        );
        return None;
    }
    if len > MAX_NAME_LEN {
        errors.push(
            "name",
            format!("O nome deve ter no máximo {MAX_NAME_LEN} caracteres."),
        );
        return None;
    }
    Some(name.to_owned())
}

/// Validate a phone number. Returns it unchanged when valid.
pub fn check_phone(phone: Option<&str>, errors: &mut ValidationErrors) -> Option<String> {
    let Some(phone) = phone.filter(|p| !p.is_empty()) else {
        errors.push("phone", "O telefone é obrigatório.");
        return None;
    };
    if !is_valid_phone(phone) {
        errors.push(
            "phone",
            "Telefone inválido: use apenas dígitos com DDD (10 ou 11 dígitos).",
        );
        return None;
    }
    Some(phone.to_owned())
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_BR.is_match(phone)
}
