pub mod nanoid;

use crate::shared::errors::{AppError, AppResult};

pub use self::nanoid::{generate_id, is_valid_nanoid};

/// 金額のバリデーション
///
/// 価格の計算は行わない。記録として妥当な値かだけを確認する。
///
/// # バリデーション規則
/// - 正の有限な数値であること
/// - 小数点以下は2桁まで
pub fn validate_amount(amount: f64) -> AppResult<()> {
    if !amount.is_finite() {
        return Err(AppError::validation("無効な金額です"));
    }

    if amount <= 0.0 {
        return Err(AppError::validation("金額は正の数値で入力してください"));
    }

    if amount >= 10_000_000_000.0 {
        return Err(AppError::validation("金額は10桁以内で入力してください"));
    }

    let amount_str = format!("{amount:.10}");
    if let Some(decimal_pos) = amount_str.find('.') {
        let significant_decimals = amount_str[decimal_pos + 1..].trim_end_matches('0');
        if significant_decimals.len() > 2 {
            return Err(AppError::validation(
                "金額は小数点以下2桁まで入力してください",
            ));
        }
    }

    Ok(())
}

/// 通貨コードのバリデーション（ISO 4217形式の英大文字3文字）
pub fn validate_currency(currency: &str) -> AppResult<()> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(AppError::validation(
            "通貨コードは英大文字3文字で入力してください",
        ));
    }
    Ok(())
}

/// 必須フィールドのバリデーション
///
/// # 引数
/// * `text` - 検証対象の文字列
/// * `field_name` - フィールド名（エラーメッセージ用）
pub fn validate_required_field(text: &str, field_name: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::validation(format!("{field_name}は必須項目です")));
    }
    Ok(())
}

/// 文字列の長さバリデーション
pub fn validate_text_length(text: &str, max_length: usize, field_name: &str) -> AppResult<()> {
    let char_count = text.chars().count();
    if char_count > max_length {
        return Err(AppError::validation(format!(
            "{field_name}は{max_length}文字以内で入力してください（現在: {char_count}文字）"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(1.0).is_ok());
        assert!(validate_amount(100.50).is_ok());
        assert!(validate_amount(0.01).is_ok());

        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(-1.0).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(1.234).is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("NGN").is_ok());
        assert!(validate_currency("USD").is_ok());

        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("US").is_err());
        assert!(validate_currency("USDT").is_err());
    }

    #[test]
    fn test_validate_required_field() {
        assert!(validate_required_field("receipts/abc.png", "支払い証明").is_ok());
        assert!(validate_required_field("", "支払い証明").is_err());
        assert!(validate_required_field("   ", "支払い証明").is_err());
    }

    #[test]
    fn test_validate_text_length() {
        assert!(validate_text_length("short", 10, "テスト").is_ok());
        assert!(validate_text_length(&"a".repeat(11), 10, "テスト").is_err());
    }
}
