pub mod audit;
pub mod ledger;
pub mod payment_gateway;
pub mod settlement;

pub use audit::AuditTrailService;
pub use ledger::{LedgerLine, LedgerService, LegacyBalances};
pub use payment_gateway::{
    CheckoutRequest, CheckoutSession, HttpPaymentGateway, PaymentGateway, UnconfiguredGateway,
};
pub use settlement::{
    settlement_digest, CorrectedBuyIn, CorrectedCashOut, CorrectedInputs, NetPaymentCheckout,
    SettlementService, SettlementView,
};
