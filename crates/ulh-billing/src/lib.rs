// SPDX-License-Identifier: MIT OR Apache-2.0
//! Billing Settler (C9, spec §4.8): charges the caller for a successful,
//! non-owner call by invoking the relational store's atomic balance
//! transfer, and maps the three possible outcomes onto what the dispatcher
//! should do next.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use ulh_repository::{BalanceLedger, RepositoryError, TransferOutcome};

/// What happened when settlement was attempted (or why it wasn't).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The call was unsuccessful, or the caller owns the app — no charge
    /// is ever attempted (spec §4.8 "Triggered only if...").
    NotApplicable,
    /// The function is free (`price_cents == 0`).
    Skipped,
    /// Funds moved.
    Settled,
    /// The caller's balance was too low; the tool result must be replaced
    /// with a payment-required response.
    InsufficientBalance,
    /// The ledger call itself failed. Treated as "not charged"; the
    /// original tool result stands.
    TransportFailure,
}

/// A settlement attempt's outcome plus the amount actually charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub outcome: SettlementOutcome,
    pub charged_cents: i64,
}

impl Settlement {
    #[must_use]
    pub fn requires_payment_required_response(&self) -> bool {
        self.outcome == SettlementOutcome::InsufficientBalance
    }
}

/// Attempt to settle one call's charge.
///
/// Precondition for an actual transfer attempt: `result_success` and
/// `!is_owner` and `price_cents > 0`. Any other combination is reported
/// without touching the ledger.
pub async fn settle(
    result_success: bool,
    is_owner: bool,
    from_user_id: &str,
    to_user_id: &str,
    price_cents: i64,
    ledger: &dyn BalanceLedger,
) -> Settlement {
    if !result_success || is_owner {
        return Settlement { outcome: SettlementOutcome::NotApplicable, charged_cents: 0 };
    }
    if price_cents <= 0 {
        return Settlement { outcome: SettlementOutcome::Skipped, charged_cents: 0 };
    }

    match ledger.transfer_balance(from_user_id, to_user_id, price_cents).await {
        Ok(TransferOutcome::Settled) => {
            Settlement { outcome: SettlementOutcome::Settled, charged_cents: price_cents }
        }
        Ok(TransferOutcome::InsufficientFunds) => {
            Settlement { outcome: SettlementOutcome::InsufficientBalance, charged_cents: 0 }
        }
        Err(e) => {
            log_transport_failure(&e);
            Settlement { outcome: SettlementOutcome::TransportFailure, charged_cents: 0 }
        }
    }
}

fn log_transport_failure(e: &RepositoryError) {
    tracing::warn!(error = %e, "balance transfer failed, leaving call unbilled");
}

/// The message text returned in place of a successful result when
/// settlement finds an insufficient balance (spec §4.8). The tool's side
/// effects already happened; this only changes what the caller sees.
#[must_use]
pub fn payment_required_message(price_cents: i64) -> String {
    format!(
        "Insufficient balance. This tool costs {price_cents}\u{a2} per call. \
         Please add funds to your account to continue."
    )
}
