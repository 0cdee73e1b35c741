//! The outbound payment-creation seam.

use bankpost_core::{RowIndex, SourceType, Transaction};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// One customer payment to create in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub source_type: SourceType,
    pub source_row_index: RowIndex,
    pub amount: Decimal,
    pub posting_date: NaiveDate,
    /// Standardized name when resolved, raw narration text otherwise.
    pub counterparty: String,
    pub bank_reference: Option<String>,
    pub description: Option<String>,
}

impl From<&Transaction> for PaymentRequest {
    fn from(txn: &Transaction) -> Self {
        Self {
            source_type: txn.source_type,
            source_row_index: txn.source_row_index,
            amount: txn.amount(),
            posting_date: txn.posted_date,
            counterparty: txn.counterparty().to_string(),
            bank_reference: txn.bank_reference.clone(),
            description: txn.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment_id: Option<String>,
}

/// A rejected or failed submission. `retryable` failures (timeouts, server
/// errors) are expected to succeed on a later run without changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SubmissionFailure {
    pub message: String,
    pub retryable: bool,
}

impl SubmissionFailure {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Creates payments in the external ledger. Calls are treated as
/// non-idempotent: each is made at most once per row per run.
pub trait PaymentClient {
    fn create_payment(&mut self, request: &PaymentRequest) -> Result<PaymentReceipt, SubmissionFailure>;
}

impl<C: PaymentClient + ?Sized> PaymentClient for Box<C> {
    fn create_payment(&mut self, request: &PaymentRequest) -> Result<PaymentReceipt, SubmissionFailure> {
        (**self).create_payment(request)
    }
}

impl<C: PaymentClient + ?Sized> PaymentClient for &mut C {
    fn create_payment(&mut self, request: &PaymentRequest) -> Result<PaymentReceipt, SubmissionFailure> {
        (**self).create_payment(request)
    }
}
