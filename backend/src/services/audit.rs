use crate::error::{AppError, AppResult};
use crate::models::{LedgerEntry, Settlement, SettlementDispute};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "settlement_generated", "dispute_filed", "ledger_paid", etc.
    pub game_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub details: serde_json::Value,
}

/// Append-only JSON-lines record of settlement and payment actions.
///
/// Built with [`AuditTrailService::disabled`] it accepts and drops entries.
pub struct AuditTrailService {
    log_file: Option<PathBuf>,
    file_handle: Option<Arc<Mutex<std::fs::File>>>,
}

impl AuditTrailService {
    /// Create a new audit trail service writing under `log_directory`
    pub fn new(log_directory: &Path) -> AppResult<Self> {
        // Ensure directory exists
        std::fs::create_dir_all(log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        // Create log file with date
        let date = chrono::Utc::now().format("%Y-%m-%d");
        let log_file = log_directory.join(format!("audit_{}.log", date));

        // Open file in append mode
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))?;

        info!("Audit trail initialized: {:?}", log_file);

        Ok(Self {
            log_file: Some(log_file),
            file_handle: Some(Arc::new(Mutex::new(file))),
        })
    }

    /// An audit trail that records nothing
    pub fn disabled() -> Self {
        Self {
            log_file: None,
            file_handle: None,
        }
    }

    /// Path of the current log file, if enabled
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Log an audit entry
    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        let Some(handle) = &self.file_handle else {
            return Ok(());
        };

        let json = serde_json::to_string(&entry)?;

        let mut file = handle.lock().await;
        writeln!(file, "{}", json)
            .map_err(|e| AppError::Message(format!("Failed to write audit log: {}", e)))?;

        file.flush()
            .map_err(|e| AppError::Message(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    fn entry(
        event_type: &str,
        game_id: Option<Uuid>,
        actor_id: Option<Uuid>,
        details: serde_json::Value,
    ) -> AuditLogEntry {
        AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: event_type.to_string(),
            game_id,
            actor_id,
            details,
        }
    }

    /// Log settlement generation or regeneration
    pub async fn log_settlement_generated(
        &self,
        settlement: &Settlement,
        actor_id: Uuid,
    ) -> AppResult<()> {
        self.log(Self::entry(
            "settlement_generated",
            Some(settlement.game_id),
            Some(actor_id),
            serde_json::json!({
                "settlement_id": settlement.id.to_string(),
                "version": settlement.version,
                "payments": settlement.payments.len(),
                "discrepancy": settlement.discrepancy.to_string(),
                "digest": settlement.digest,
            }),
        ))
        .await
    }

    /// Log a dispute being filed or changing status
    pub async fn log_dispute(&self, dispute: &SettlementDispute, actor_id: Uuid) -> AppResult<()> {
        self.log(Self::entry(
            "dispute_updated",
            Some(dispute.game_id),
            Some(actor_id),
            serde_json::json!({
                "dispute_id": dispute.id.to_string(),
                "category": dispute.category.as_str(),
                "status": dispute.status.as_str(),
            }),
        ))
        .await
    }

    /// Log a paid-flag change on one ledger row
    pub async fn log_ledger_paid(&self, entry: &LedgerEntry, actor_id: Uuid) -> AppResult<()> {
        self.log(Self::entry(
            "ledger_paid_toggled",
            Some(entry.game_id),
            Some(actor_id),
            serde_json::json!({
                "ledger_id": entry.id.to_string(),
                "paid": entry.paid,
                "amount": entry.amount.to_string(),
            }),
        ))
        .await
    }

    /// Log a checkout handed to the payment gateway
    pub async fn log_payment_initiated(
        &self,
        ledger_ids: &[Uuid],
        actor_id: Uuid,
        amount: rust_decimal::Decimal,
        checkout_id: &str,
    ) -> AppResult<()> {
        self.log(Self::entry(
            "payment_initiated",
            None,
            Some(actor_id),
            serde_json::json!({
                "ledger_ids": ledger_ids,
                "amount": amount.to_string(),
                "checkout_id": checkout_id,
            }),
        ))
        .await
    }

    /// Log a gateway confirmation covering `ledger_ids`
    pub async fn log_payment_confirmed(&self, ledger_ids: &[Uuid], actor_id: Uuid) -> AppResult<()> {
        self.log(Self::entry(
            "payment_confirmed",
            None,
            Some(actor_id),
            serde_json::json!({ "ledger_ids": ledger_ids }),
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_trail_drops_entries() {
        let audit = AuditTrailService::disabled();
        assert!(audit.log_file().is_none());
        audit
            .log(AuditTrailService::entry("noop", None, None, serde_json::Value::Null))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_entries_are_json_lines() {
        let dir = std::env::temp_dir().join(format!("kvitt-audit-{}", Uuid::new_v4()));
        let audit = AuditTrailService::new(&dir).unwrap();
        let game_id = Uuid::new_v4();

        for _ in 0..2 {
            audit
                .log(AuditTrailService::entry(
                    "settlement_generated",
                    Some(game_id),
                    None,
                    serde_json::json!({ "version": 1 }),
                ))
                .await
                .unwrap();
        }

        let contents = std::fs::read_to_string(audit.log_file().unwrap()).unwrap();
        let lines: Vec<AuditLogEntry> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].game_id, Some(game_id));

        std::fs::remove_dir_all(dir).ok();
    }
}
