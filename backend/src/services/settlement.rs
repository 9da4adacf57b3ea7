use super::audit::AuditTrailService;
use super::ledger::LedgerService;
use super::payment_gateway::{CheckoutRequest, CheckoutSession, PaymentGateway};
use crate::engine::{self, GameNetPositions, SettlementPlan};
use crate::error::{AppError, AppResult};
use crate::models::{
    BalanceDirection, BuyIn, CashOut, DisputeCategory, DisputeStatus, Game, LedgerEntry, Payment,
    PlayerGameResult, Settlement, SettlementDispute, SettlementState, MAX_DISPUTE_MESSAGE_LEN,
};
use crate::repositories::SettlementStore;
use crate::websocket::WebSocketServer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A game's settlement as served to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementView {
    pub game_id: Uuid,
    pub group_id: Uuid,
    pub state: SettlementState,
    pub results: Vec<PlayerGameResult>,
    pub payments: Vec<Payment>,
    pub total_buy_in: Decimal,
    pub total_cash_out: Decimal,
    pub has_discrepancy: bool,
    pub discrepancy: Decimal,
    pub version: Option<i32>,
    pub digest: Option<String>,
    /// Ledger rows backing `payments`, for mark-paid and checkout
    pub ledger: Vec<LedgerEntry>,
}

/// Replacement buy-in supplied when resolving a dispute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectedBuyIn {
    pub user_id: Uuid,
    pub amount: Decimal,
}

/// Replacement cash-out supplied when resolving a dispute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectedCashOut {
    pub user_id: Uuid,
    pub chips: Decimal,
}

/// Full replacement of a game's inputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectedInputs {
    pub buy_ins: Vec<CorrectedBuyIn>,
    pub cash_outs: Vec<CorrectedCashOut>,
}

/// Checkout opened for a consolidated balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetPaymentCheckout {
    pub checkout: CheckoutSession,
    pub amount: Decimal,
    pub ledger_ids: Vec<Uuid>,
}

/// Settlement service: generation, disputes, and the payment gate
pub struct SettlementService {
    store: Arc<dyn SettlementStore>,
    ledger: Arc<LedgerService>,
    gateway: Arc<dyn PaymentGateway>,
    ws_server: Arc<WebSocketServer>,
    audit: Arc<AuditTrailService>,
}

impl SettlementService {
    /// Create a new settlement service
    pub fn new(
        store: Arc<dyn SettlementStore>,
        ledger: Arc<LedgerService>,
        gateway: Arc<dyn PaymentGateway>,
        ws_server: Arc<WebSocketServer>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            store,
            ledger,
            gateway,
            ws_server,
            audit,
        }
    }

    // =========================================================================
    // Generation
    // =========================================================================

    /// End a game and generate its settlement.
    ///
    /// Only the host may end a game. A game is settled at most once; a
    /// second call, concurrent or not, fails with `Conflict`.
    pub async fn end_game(&self, game_id: Uuid, caller: Uuid) -> AppResult<SettlementView> {
        let game = self.load_game(game_id).await?;
        if game.host_id != caller {
            return Err(AppError::Unauthorized(
                "Only the host can end the game".to_string(),
            ));
        }

        if self.store.get_settlement(game_id).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Game {} is already settled",
                game_id
            )));
        }

        let game = self.store.mark_game_ended(game_id).await?;
        info!("Game {} ended by host {}", game_id, caller);

        let (positions, plan) = self.compute(&game).await?;
        let settlement = build_settlement(&game, &positions, &plan, 1, None);
        let entries = ledger_entries(&game, &settlement.payments);

        if let Err(e) = self.store.insert_settlement(&settlement, &entries).await {
            let err = AppError::from(e);
            match &err {
                AppError::Conflict(_) => {
                    warn!("Settlement for game {} was generated concurrently", game_id)
                }
                _ => error!("Failed to persist settlement for game {}: {}", game_id, err),
            }
            return Err(err);
        }

        info!(
            "Settlement generated for game {}: {} payments, discrepancy {}",
            game_id,
            settlement.payments.len(),
            settlement.discrepancy
        );

        self.audit_result(self.audit.log_settlement_generated(&settlement, caller).await);
        self.ws_server.broadcast_settlement_ready(&settlement).await;

        Ok(self.view(&game, Some(settlement), SettlementState::Settled, entries))
    }

    /// Current settlement of a game, or an empty `no_settlement` view
    pub async fn get_settlement(&self, game_id: Uuid, caller: Uuid) -> AppResult<SettlementView> {
        let game = self.load_game(game_id).await?;
        let settlement = self.store.get_settlement(game_id).await?;

        if let Some(settlement) = &settlement {
            ensure_participant(&game, settlement, caller)?;
        }

        let state = self.state_of(settlement.as_ref(), game_id).await?;
        let ledger = match settlement {
            Some(_) => self.store.ledger_for_game(game_id).await?,
            None => Vec::new(),
        };

        Ok(self.view(&game, settlement, state, ledger))
    }

    /// Lifecycle state of a game's settlement
    pub async fn settlement_state(&self, game_id: Uuid) -> AppResult<SettlementState> {
        let settlement = self.store.get_settlement(game_id).await?;
        self.state_of(settlement.as_ref(), game_id).await
    }

    async fn state_of(
        &self,
        settlement: Option<&Settlement>,
        game_id: Uuid,
    ) -> AppResult<SettlementState> {
        if settlement.is_none() {
            return Ok(SettlementState::NoSettlement);
        }

        let disputes = self.store.disputes_for_game(game_id).await?;
        if disputes.iter().any(|d| d.status.is_blocking()) {
            Ok(SettlementState::Disputed)
        } else {
            Ok(SettlementState::Settled)
        }
    }

    async fn compute(&self, game: &Game) -> AppResult<(GameNetPositions, SettlementPlan)> {
        let buy_ins = self.store.buy_ins_for_game(game.id).await?;
        let cash_outs = self.store.cash_outs_for_game(game.id).await?;
        self.compute_from(game, &buy_ins, &cash_outs).await
    }

    async fn compute_from(
        &self,
        game: &Game,
        buy_ins: &[BuyIn],
        cash_outs: &[CashOut],
    ) -> AppResult<(GameNetPositions, SettlementPlan)> {
        let mut player_ids: Vec<Uuid> = Vec::new();
        for user_id in buy_ins
            .iter()
            .map(|b| b.user_id)
            .chain(cash_outs.iter().map(|c| c.user_id))
        {
            if !player_ids.contains(&user_id) {
                player_ids.push(user_id);
            }
        }
        let players = self.store.users_by_ids(&player_ids).await?;

        let results = engine::collect_player_results(game, &players, buy_ins, cash_outs)?;
        let positions = engine::compute_net_positions(&results)?;

        if positions.has_discrepancy {
            warn!(
                "Game {} does not balance: cash-out {} vs buy-in {} (discrepancy {})",
                game.id, positions.total_cash_out, positions.total_buy_in, positions.discrepancy
            );
        }

        let plan = engine::settle_results(&positions.results);
        for leftover in &plan.unallocated {
            warn!(
                "Game {}: {} of player {} could not be matched",
                game.id, leftover.amount, leftover.user_id
            );
        }

        Ok((positions, plan))
    }

    // =========================================================================
    // Disputes
    // =========================================================================

    /// File a dispute against a game's settlement; pauses payments
    pub async fn file_dispute(
        &self,
        game_id: Uuid,
        caller: Uuid,
        category: DisputeCategory,
        message: &str,
    ) -> AppResult<SettlementDispute> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::Validation("Dispute message is required".to_string()));
        }
        if message.chars().count() > MAX_DISPUTE_MESSAGE_LEN {
            return Err(AppError::Validation(format!(
                "Dispute message exceeds {} characters",
                MAX_DISPUTE_MESSAGE_LEN
            )));
        }

        let game = self.load_game(game_id).await?;
        let settlement = self.store.get_settlement(game_id).await?.ok_or_else(|| {
            AppError::BusinessLogic(format!("Game {} has no settlement to dispute", game_id))
        })?;
        ensure_participant(&game, &settlement, caller)?;

        let dispute = SettlementDispute::new(game_id, caller, category, message);
        self.store.insert_dispute(&dispute).await?;

        info!(
            "Dispute {} ({}) filed on game {} by {}; payments paused",
            dispute.id,
            category.as_str(),
            game_id,
            caller
        );

        self.audit_result(self.audit.log_dispute(&dispute, caller).await);
        self.ws_server.broadcast_dispute_filed(&dispute).await;

        Ok(dispute)
    }

    /// Disputes of a game, oldest first
    pub async fn list_disputes(
        &self,
        game_id: Uuid,
        caller: Uuid,
    ) -> AppResult<Vec<SettlementDispute>> {
        let game = self.load_game(game_id).await?;
        if let Some(settlement) = self.store.get_settlement(game_id).await? {
            ensure_participant(&game, &settlement, caller)?;
        } else if game.host_id != caller {
            return Err(AppError::Unauthorized(
                "Only participants can view disputes".to_string(),
            ));
        }

        Ok(self.store.disputes_for_game(game_id).await?)
    }

    /// Host picks up an open dispute
    pub async fn start_review(&self, dispute_id: Uuid, caller: Uuid) -> AppResult<SettlementDispute> {
        let (_, mut dispute) = self.load_dispute_for_host(dispute_id, caller).await?;
        transition(&mut dispute, DisputeStatus::Reviewing)?;
        self.store.update_dispute(&dispute).await?;

        info!("Dispute {} under review by host {}", dispute_id, caller);
        self.audit_result(self.audit.log_dispute(&dispute, caller).await);

        Ok(dispute)
    }

    /// Resolve a dispute, optionally re-running settlement on corrected inputs.
    ///
    /// A re-run replaces the game's inputs, settlement and ledger rows in
    /// full; it is refused once any of the game's rows has been paid.
    pub async fn resolve_dispute(
        &self,
        dispute_id: Uuid,
        caller: Uuid,
        resolution_note: Option<String>,
        corrections: Option<CorrectedInputs>,
    ) -> AppResult<SettlementDispute> {
        let (game, mut dispute) = self.load_dispute_for_host(dispute_id, caller).await?;
        if !dispute.status.can_transition_to(DisputeStatus::Resolved) {
            return Err(AppError::BusinessLogic(format!(
                "Dispute {} is already {}",
                dispute_id,
                dispute.status.as_str()
            )));
        }

        let recomputed = match corrections {
            Some(corrections) => {
                self.recompute(&game, corrections, caller).await?;
                true
            }
            None => false,
        };

        transition(&mut dispute, DisputeStatus::Resolved)?;
        dispute.resolution_note = resolution_note
            .map(|note| note.trim().to_string())
            .filter(|note| !note.is_empty());
        self.store.update_dispute(&dispute).await?;

        info!(
            "Dispute {} on game {} resolved by host {} (recomputed: {})",
            dispute_id, game.id, caller, recomputed
        );

        self.audit_result(self.audit.log_dispute(&dispute, caller).await);
        self.ws_server
            .broadcast_dispute_resolved(&dispute, recomputed)
            .await;

        Ok(dispute)
    }

    async fn recompute(
        &self,
        game: &Game,
        corrections: CorrectedInputs,
        caller: Uuid,
    ) -> AppResult<Settlement> {
        let current = self.store.get_settlement(game.id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Settlement for game {} not found", game.id))
        })?;

        let existing = self.store.ledger_for_game(game.id).await?;
        if existing.iter().any(|e| e.paid) {
            return Err(AppError::BusinessLogic(
                "Cannot recompute a settlement after payments were recorded".to_string(),
            ));
        }

        let buy_ins: Vec<BuyIn> = corrections
            .buy_ins
            .iter()
            .map(|b| BuyIn::new(game.id, b.user_id, b.amount, true))
            .collect();
        let cash_outs: Vec<CashOut> = corrections
            .cash_outs
            .iter()
            .map(|c| CashOut::new(game.id, c.user_id, c.chips))
            .collect();

        // Nothing is stored until the corrected plan exists
        let (positions, plan) = self.compute_from(game, &buy_ins, &cash_outs).await?;
        let settlement = build_settlement(game, &positions, &plan, current.version + 1, Some(&current));
        let entries = ledger_entries(game, &settlement.payments);

        self.store
            .replace_settlement(&settlement, &buy_ins, &cash_outs, &entries)
            .await?;

        info!(
            "Settlement for game {} recomputed as version {} ({} payments)",
            game.id,
            settlement.version,
            settlement.payments.len()
        );

        self.audit_result(self.audit.log_settlement_generated(&settlement, caller).await);
        self.ws_server.broadcast_settlement_ready(&settlement).await;

        Ok(settlement)
    }

    async fn load_dispute_for_host(
        &self,
        dispute_id: Uuid,
        caller: Uuid,
    ) -> AppResult<(Game, SettlementDispute)> {
        let dispute = self
            .store
            .get_dispute(dispute_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Dispute {} not found", dispute_id)))?;
        let game = self.load_game(dispute.game_id).await?;
        if game.host_id != caller {
            return Err(AppError::Unauthorized(
                "Only the host can review disputes".to_string(),
            ));
        }
        Ok((game, dispute))
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Set or clear the paid flag of one ledger row
    pub async fn set_paid(&self, ledger_id: Uuid, caller: Uuid, paid: bool) -> AppResult<LedgerEntry> {
        let entry = self.load_entry(ledger_id).await?;
        if !entry.involves(caller) {
            return Err(AppError::Unauthorized(
                "Only the payer or payee can update this entry".to_string(),
            ));
        }
        self.ensure_not_under_review(entry.game_id).await?;

        if entry.paid == paid {
            return Ok(entry);
        }

        let entry = self.store.set_ledger_paid(ledger_id, paid).await?;
        info!("Ledger entry {} marked paid={} by {}", ledger_id, paid, caller);

        self.audit_result(self.audit.log_ledger_paid(&entry, caller).await);
        self.ws_server
            .broadcast_ledger_updated(std::slice::from_ref(&entry))
            .await;

        Ok(entry)
    }

    /// Open a gateway checkout for one unpaid ledger row
    pub async fn initiate_payment(
        &self,
        ledger_id: Uuid,
        caller: Uuid,
        origin_url: &str,
    ) -> AppResult<CheckoutSession> {
        validate_origin_url(origin_url)?;

        let entry = self.load_entry(ledger_id).await?;
        if entry.from_user_id != caller {
            return Err(AppError::Unauthorized(
                "Only the payer can pay this entry".to_string(),
            ));
        }
        if entry.paid {
            return Err(AppError::BusinessLogic(format!(
                "Ledger entry {} is already paid",
                ledger_id
            )));
        }
        self.ensure_not_under_review(entry.game_id).await?;

        let request = CheckoutRequest {
            payer_id: entry.from_user_id,
            payee_id: entry.to_user_id,
            amount: entry.amount,
            ledger_ids: vec![entry.id],
            origin_url: origin_url.to_string(),
            description: format!("Kvitt settlement for game {}", entry.game_id),
        };
        let session = self.gateway.create_checkout(&request).await?;

        self.audit_result(
            self.audit
                .log_payment_initiated(&request.ledger_ids, caller, request.amount, &session.checkout_id)
                .await,
        );

        Ok(session)
    }

    /// Open one checkout covering the caller's whole net debt to `other_user_id`.
    ///
    /// `ledger_ids` must be exactly the balance's `all_ledger_ids`; a
    /// mismatch means the client's view is stale.
    pub async fn prepare_net_payment(
        &self,
        caller: Uuid,
        other_user_id: Uuid,
        ledger_ids: &[Uuid],
        origin_url: &str,
    ) -> AppResult<NetPaymentCheckout> {
        validate_origin_url(origin_url)?;

        let report = self.ledger.consolidated(caller).await?;
        let balance = report.balance_with(other_user_id).ok_or_else(|| {
            AppError::NotFound(format!("No outstanding balance with user {}", other_user_id))
        })?;

        if balance.direction != BalanceDirection::YouOwe {
            return Err(AppError::BusinessLogic(
                "Nothing to pay: the counterparty owes you".to_string(),
            ));
        }

        let requested: HashSet<Uuid> = ledger_ids.iter().copied().collect();
        let expected: HashSet<Uuid> = balance.all_ledger_ids.iter().copied().collect();
        if requested != expected {
            return Err(AppError::Validation(
                "Ledger entries do not match the current consolidated balance".to_string(),
            ));
        }

        for game in &balance.game_breakdown {
            self.ensure_not_under_review(game.game_id).await?;
        }

        let request = CheckoutRequest {
            payer_id: caller,
            payee_id: other_user_id,
            amount: balance.display_amount,
            ledger_ids: balance.all_ledger_ids.clone(),
            origin_url: origin_url.to_string(),
            description: format!(
                "Kvitt net settlement across {} games",
                balance.game_breakdown.len()
            ),
        };
        let session = self.gateway.create_checkout(&request).await?;

        info!(
            "Net checkout {} for {} -> {}: {} over {} entries",
            session.checkout_id,
            caller,
            other_user_id,
            request.amount,
            request.ledger_ids.len()
        );
        self.audit_result(
            self.audit
                .log_payment_initiated(&request.ledger_ids, caller, request.amount, &session.checkout_id)
                .await,
        );

        Ok(NetPaymentCheckout {
            checkout: session,
            amount: request.amount,
            ledger_ids: request.ledger_ids,
        })
    }

    /// Record a gateway-confirmed payment: every listed row becomes paid.
    ///
    /// The caller must be a party to every row, and no game behind the rows
    /// may be under review. Any failure leaves all rows untouched.
    pub async fn confirm_payment(
        &self,
        caller: Uuid,
        ledger_ids: &[Uuid],
    ) -> AppResult<Vec<LedgerEntry>> {
        if ledger_ids.is_empty() {
            return Err(AppError::Validation("No ledger entries to confirm".to_string()));
        }

        let mut game_ids: Vec<Uuid> = Vec::new();
        for ledger_id in ledger_ids {
            let entry = self.load_entry(*ledger_id).await?;
            if !entry.involves(caller) {
                return Err(AppError::Unauthorized(format!(
                    "Ledger entry {} does not involve the caller",
                    ledger_id
                )));
            }
            if !game_ids.contains(&entry.game_id) {
                game_ids.push(entry.game_id);
            }
        }
        for game_id in game_ids {
            self.ensure_not_under_review(game_id).await?;
        }

        let entries = self.store.mark_ledger_paid_many(ledger_ids).await?;
        info!(
            "Payment confirmed by {} for {} ledger entries",
            caller,
            entries.len()
        );

        self.audit_result(self.audit.log_payment_confirmed(ledger_ids, caller).await);
        self.ws_server.broadcast_ledger_updated(&entries).await;

        Ok(entries)
    }

    async fn ensure_not_under_review(&self, game_id: Uuid) -> AppResult<()> {
        if self.settlement_state(game_id).await?.is_under_review() {
            warn!("Payment action on game {} blocked: settlement under review", game_id);
            return Err(AppError::SettlementUnderReview(game_id));
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load_game(&self, game_id: Uuid) -> AppResult<Game> {
        self.store
            .get_game(game_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Game {} not found", game_id)))
    }

    async fn load_entry(&self, ledger_id: Uuid) -> AppResult<LedgerEntry> {
        self.store
            .get_ledger_entry(ledger_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ledger entry {} not found", ledger_id)))
    }

    fn audit_result(&self, result: AppResult<()>) {
        if let Err(e) = result {
            warn!("Failed to write audit entry: {}", e);
        }
    }

    fn view(
        &self,
        game: &Game,
        settlement: Option<Settlement>,
        state: SettlementState,
        ledger: Vec<LedgerEntry>,
    ) -> SettlementView {
        match settlement {
            Some(s) => SettlementView {
                game_id: s.game_id,
                group_id: s.group_id,
                state,
                results: s.results,
                payments: s.payments,
                total_buy_in: s.total_buy_in,
                total_cash_out: s.total_cash_out,
                has_discrepancy: s.has_discrepancy,
                discrepancy: s.discrepancy,
                version: Some(s.version),
                digest: Some(s.digest),
                ledger,
            },
            None => SettlementView {
                game_id: game.id,
                group_id: game.group_id,
                state,
                results: Vec::new(),
                payments: Vec::new(),
                total_buy_in: Decimal::ZERO,
                total_cash_out: Decimal::ZERO,
                has_discrepancy: false,
                discrepancy: Decimal::ZERO,
                version: None,
                digest: None,
                ledger,
            },
        }
    }
}

fn ensure_participant(game: &Game, settlement: &Settlement, caller: Uuid) -> AppResult<()> {
    if game.host_id == caller || settlement.is_participant(caller) {
        Ok(())
    } else {
        Err(AppError::Unauthorized(
            "Only participants can access this settlement".to_string(),
        ))
    }
}

fn transition(dispute: &mut SettlementDispute, next: DisputeStatus) -> AppResult<()> {
    if !dispute.status.can_transition_to(next) {
        return Err(AppError::BusinessLogic(format!(
            "Dispute {} cannot move from {} to {}",
            dispute.id,
            dispute.status.as_str(),
            next.as_str()
        )));
    }
    dispute.status = next;
    if next == DisputeStatus::Resolved {
        dispute.resolved_at = Some(chrono::Utc::now().naive_utc());
    }
    Ok(())
}

fn validate_origin_url(origin_url: &str) -> AppResult<()> {
    let url = origin_url.trim();
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(AppError::Validation(
            "origin_url must be an http(s) URL".to_string(),
        ))
    }
}

/// Hex SHA-256 over results and payments.
///
/// Amounts are normalized first so `20` and `20.00` hash alike.
pub fn settlement_digest(results: &[PlayerGameResult], payments: &[Payment]) -> String {
    let mut hasher = Sha256::new();
    for result in results {
        hasher.update(result.user_id.as_bytes());
        hasher.update(result.total_buy_in.normalize().to_string().as_bytes());
        hasher.update(b"/");
        hasher.update(result.cash_out.normalize().to_string().as_bytes());
        hasher.update(b";");
    }
    hasher.update(b"|");
    for payment in payments {
        hasher.update(payment.from_user_id.as_bytes());
        hasher.update(payment.to_user_id.as_bytes());
        hasher.update(payment.amount.normalize().to_string().as_bytes());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}

fn build_settlement(
    game: &Game,
    positions: &GameNetPositions,
    plan: &SettlementPlan,
    version: i32,
    previous: Option<&Settlement>,
) -> Settlement {
    let now = chrono::Utc::now().naive_utc();
    Settlement {
        id: previous.map(|p| p.id).unwrap_or_else(Uuid::new_v4),
        game_id: game.id,
        group_id: game.group_id,
        version,
        results: positions.results.clone(),
        payments: plan.payments.clone(),
        total_buy_in: positions.total_buy_in,
        total_cash_out: positions.total_cash_out,
        discrepancy: positions.discrepancy,
        has_discrepancy: positions.has_discrepancy,
        digest: settlement_digest(&positions.results, &plan.payments),
        created_at: previous.map(|p| p.created_at).unwrap_or(now),
        updated_at: now,
    }
}

fn ledger_entries(game: &Game, payments: &[Payment]) -> Vec<LedgerEntry> {
    payments
        .iter()
        .map(|p| LedgerEntry::new(game.id, game.group_id, p.from_user_id, p.to_user_id, p.amount))
        .collect()
}
