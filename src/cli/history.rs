use super::ui;
use crate::core::history::{ConversionRecord, HistoryEntry, HistoryStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::Cell;
use rust_decimal::Decimal;

/// Fields accepted by the administrative add and update commands.
#[derive(Debug, Clone)]
pub struct RecordInput {
    pub base: String,
    pub target: String,
    pub amount: Decimal,
    pub converted_amount: Decimal,
    pub timestamp: Option<DateTime<Utc>>,
}

impl RecordInput {
    fn into_record(self) -> Result<ConversionRecord> {
        if self.base.trim().is_empty() || self.target.trim().is_empty() {
            anyhow::bail!("Base currency and target currency must be provided");
        }
        Ok(ConversionRecord {
            base_currency: self.base,
            target_currency: self.target,
            amount: self.amount,
            converted_amount: self.converted_amount,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

pub fn display_history_table(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return ui::style_text("No conversions recorded yet", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("ID"),
        ui::header_cell("Timestamp (UTC)"),
        ui::header_cell("From"),
        ui::header_cell("Amount"),
        ui::header_cell("To"),
        ui::header_cell("Converted"),
    ]);

    for entry in entries {
        let record = &entry.record;
        table.add_row(vec![
            Cell::new(entry.id),
            Cell::new(record.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&record.base_currency),
            ui::amount_cell(record.amount),
            Cell::new(&record.target_currency),
            ui::amount_cell(record.converted_amount),
        ]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text("Conversion history", ui::StyleType::Title),
        table
    )
}

pub async fn list(store: &dyn HistoryStore) -> Result<()> {
    let entries = store
        .list()
        .await
        .context("Failed to list conversion history")?;
    println!("{}", display_history_table(&entries));
    Ok(())
}

pub async fn show(store: &dyn HistoryStore, id: u64) -> Result<()> {
    let entry = store
        .find(id)
        .await
        .with_context(|| format!("Failed to read conversion record {id}"))?
        .with_context(|| format!("Conversion record {id} not found"))?;
    println!("{}", display_history_table(&[entry]));
    Ok(())
}

pub async fn add(store: &dyn HistoryStore, input: RecordInput) -> Result<()> {
    let entry = store
        .append(input.into_record()?)
        .await
        .context("Failed to create conversion record")?;
    tracing::info!("Created conversion record {}", entry.id);
    println!("{}", display_history_table(&[entry]));
    Ok(())
}

pub async fn update(store: &dyn HistoryStore, id: u64, input: RecordInput) -> Result<()> {
    let entry = store
        .update(id, input.into_record()?)
        .await
        .with_context(|| format!("Failed to update conversion record {id}"))?;
    tracing::info!("Updated conversion record {}", entry.id);
    println!("{}", display_history_table(&[entry]));
    Ok(())
}

pub async fn delete(store: &dyn HistoryStore, id: u64) -> Result<()> {
    store
        .remove(id)
        .await
        .with_context(|| format!("Failed to delete conversion record {id}"))?;
    println!("Deleted conversion record {id}");
    Ok(())
}
