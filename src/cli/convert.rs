use super::ui;
use crate::core::error::{ConvertError, ErrorKind};
use crate::engine::{Conversion, ConversionEngine};
use anyhow::{Result, anyhow};
use rust_decimal::Decimal;
use tracing::error;

pub fn display_conversion(conversion: &Conversion) -> String {
    let record = &conversion.record;
    let converted = format!(
        "{} {}",
        record.converted_amount.normalize(),
        record.target_currency
    );

    let mut output = format!(
        "{} {} = {}",
        record.amount.normalize(),
        record.base_currency,
        ui::style_text(&converted, ui::StyleType::TotalValue)
    );

    match conversion.history_id() {
        Some(id) => output.push_str(&ui::style_text(
            &format!("  (history #{id})"),
            ui::StyleType::Subtle,
        )),
        None => output.push_str(&format!(
            "\n{}",
            ui::style_text(
                "Warning: the conversion was not saved to history",
                ui::StyleType::Error
            )
        )),
    }

    output
}

/// Maps a failed conversion to the message shown to the user. Internal faults
/// are logged and replaced by a generic message.
pub fn user_facing_error(err: ConvertError) -> anyhow::Error {
    match err.kind() {
        ErrorKind::ClientError => anyhow!(err),
        ErrorKind::Retryable => anyhow!("{err}. Please try again later"),
        ErrorKind::Internal => {
            error!(error = %err, "Conversion failed");
            anyhow!("An error occurred while converting currency")
        }
    }
}

pub async fn run(
    engine: &ConversionEngine,
    base: &str,
    target: &str,
    amount: Decimal,
) -> Result<()> {
    let pb = ui::new_spinner("Converting...");
    let result = engine.convert(base, target, amount).await;
    pb.finish_and_clear();

    let conversion = result.map_err(user_facing_error)?;
    println!("{}", display_conversion(&conversion));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::HistoryPersistenceFailed;
    use crate::core::history::{ConversionRecord, HistoryEntry, HistoryError};
    use crate::core::rates::ProviderError;
    use rust_decimal_macros::dec;

    fn conversion(persisted: bool) -> Conversion {
        let record = ConversionRecord::new("USD", "EUR", dec!(100), dec!(85.00));
        Conversion {
            persisted: if persisted {
                Ok(HistoryEntry {
                    id: 4,
                    record: record.clone(),
                })
            } else {
                Err(HistoryPersistenceFailed(HistoryError::Storage(
                    "io".to_string(),
                )))
            },
            record,
        }
    }

    #[test]
    fn test_display_conversion() {
        console::set_colors_enabled(false);

        let output = display_conversion(&conversion(true));
        assert_eq!(output, "100 USD = 85 EUR  (history #4)");

        let output = display_conversion(&conversion(false));
        assert!(output.starts_with("100 USD = 85 EUR\n"));
        assert!(output.contains("not saved to history"));
    }

    #[test]
    fn test_user_facing_errors() {
        let err = user_facing_error(ConvertError::UnknownCurrency {
            codes: vec!["ZZZ".to_string()],
        });
        assert_eq!(err.to_string(), "Unknown currency code(s): ZZZ");

        let err = user_facing_error(ConvertError::RateUnavailable(ProviderError::Unavailable(
            "HTTP error: 503 Service Unavailable".to_string(),
        )));
        assert!(err.to_string().ends_with("Please try again later"));

        let err = user_facing_error(ConvertError::ArithmeticOverflow {
            base: "USD".to_string(),
            target: "VND".to_string(),
            amount: Decimal::MAX,
        });
        assert_eq!(err.to_string(), "An error occurred while converting currency");
    }
}
