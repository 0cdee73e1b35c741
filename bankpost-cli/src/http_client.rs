use anyhow::{Context, Result, bail};
use bankpost_core::SourceType;
use bankpost_ledger::{PaymentClient, PaymentReceipt, PaymentRequest, SubmissionFailure};
use reqwest::StatusCode;
use reqwest::blocking::{ClientBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::LedgerSection;

pub const TOKEN_ENV: &str = "BANKPOST_API_TOKEN";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentBody<'a> {
    journal_id: &'a str,
    journal_display_name: &'a str,
    customer_id: &'a str,
    customer_number: &'a str,
    posting_date: String,
    amount: f64,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_document_number: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Customer {
    id: String,
    #[serde(default)]
    number: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    blocked: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomerPage {
    #[serde(default)]
    value: Vec<Customer>,
}

/// Blocking client for the ledger's `customers` and `customerPayments`
/// endpoints.
pub struct HttpPaymentClient {
    client: reqwest::blocking::Client,
    company_url: String,
    journals: BTreeMap<SourceType, String>,
    customers: BTreeMap<String, Customer>,
}

impl HttpPaymentClient {
    /// Every source in `sources` must have a journal id.
    pub fn new(ledger: &LedgerSection, journals: &BTreeMap<SourceType, String>, sources: &[SourceType]) -> Result<Self> {
        let token = std::env::var(TOKEN_ENV).with_context(|| format!("{TOKEN_ENV} is not set (or pass --dry-run)"))?;
        Self::with_builder(ledger, journals, sources, http_builder(&token, ledger.timeout_secs)?)
    }

    fn with_builder(
        ledger: &LedgerSection,
        journals: &BTreeMap<SourceType, String>,
        sources: &[SourceType],
        builder: ClientBuilder,
    ) -> Result<Self> {
        if ledger.company_id.trim().is_empty() {
            bail!("ledger.company_id is not configured");
        }
        for source in sources {
            if journals.get(source).is_none_or(|j| j.is_empty()) {
                bail!("no journal id configured for {source} (ledger.journals.{source})");
            }
        }

        Ok(Self {
            client: builder.build().context("build http client")?,
            company_url: format!(
                "{}/companies({})",
                ledger.base_url.trim_end_matches('/'),
                ledger.company_id.trim()
            ),
            journals: journals.clone(),
            customers: BTreeMap::new(),
        })
    }

    /// Ledger customer whose display name contains `name`. When the first hit
    /// is blocked for all postings the next one is used.
    fn customer(&mut self, name: &str) -> Result<Customer, SubmissionFailure> {
        if let Some(c) = self.customers.get(name) {
            return Ok(c.clone());
        }

        let filter = format!("contains(displayName,'{}')", name.trim().replace('\'', "''"));
        let resp = self
            .client
            .get(format!("{}/customers", self.company_url))
            .query(&[("$filter", filter)])
            .send()
            .map_err(|e| SubmissionFailure::retryable(format!("customer lookup failed: {e}")))?;
        let resp = check_status(resp, "customer lookup")?;

        let page: CustomerPage = resp
            .json()
            .map_err(|e| SubmissionFailure::rejected(format!("unreadable customer list: {e}")))?;
        let customer = pick_customer(page.value)
            .ok_or_else(|| SubmissionFailure::rejected(format!("customer not found in ledger: {name}")))?;

        tracing::debug!(name, id = %customer.id, number = %customer.number, "customer found");
        self.customers.insert(name.to_string(), customer.clone());
        Ok(customer)
    }
}

impl PaymentClient for HttpPaymentClient {
    fn create_payment(&mut self, req: &PaymentRequest) -> Result<PaymentReceipt, SubmissionFailure> {
        let journal = self
            .journals
            .get(&req.source_type)
            .cloned()
            .ok_or_else(|| SubmissionFailure::rejected(format!("no journal id for {}", req.source_type)))?;
        let customer = self.customer(&req.counterparty)?;
        let body = payment_body(&journal, req, &customer);

        let resp = self
            .client
            .post(format!("{}/customerPayments", self.company_url))
            .json(&body)
            .send()
            .map_err(|e| SubmissionFailure::retryable(format!("request failed: {e}")))?;
        let resp = check_status(resp, "ledger")?;

        // The payment exists once the ledger says 2xx, whatever the body holds.
        let payment_id = resp.json::<PaymentResponse>().ok().and_then(|r| r.id);
        if payment_id.is_none() {
            tracing::warn!(
                source = %req.source_type,
                row = req.source_row_index,
                "ledger accepted the payment without returning an id"
            );
        }
        Ok(PaymentReceipt { payment_id })
    }
}

fn http_builder(token: &str, timeout_secs: u64) -> Result<ClientBuilder> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(reqwest::blocking::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs)))
}

fn check_status(resp: Response, what: &str) -> Result<Response, SubmissionFailure> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let txt = resp.text().unwrap_or_default();
    let message = format!("{what} error: {status} {}", txt.trim());
    Err(if is_retryable(status) {
        SubmissionFailure::retryable(message)
    } else {
        SubmissionFailure::rejected(message)
    })
}

fn pick_customer(found: Vec<Customer>) -> Option<Customer> {
    let mut found = found.into_iter();
    let first = found.next()?;
    if first.blocked.as_deref() == Some("All") {
        if let Some(next) = found.next() {
            tracing::info!(blocked = %first.display_name, using = %next.display_name, "first customer blocked");
            return Some(next);
        }
    }
    Some(first)
}

/// Money received from a customer is posted negative; a refund paid out is
/// posted positive.
fn ledger_amount(amount: Decimal) -> f64 {
    (-amount).to_f64().unwrap_or_default()
}

fn payment_body<'a>(journal: &'a str, req: &'a PaymentRequest, customer: &'a Customer) -> PaymentBody<'a> {
    let description = req
        .description
        .clone()
        .filter(|d| !d.trim().is_empty())
        .or_else(|| (!customer.display_name.is_empty()).then(|| customer.display_name.clone()))
        .unwrap_or_else(|| format!("Payment from {}", customer.number));

    PaymentBody {
        journal_id: journal,
        journal_display_name: req.source_type.label(),
        customer_id: &customer.id,
        customer_number: &customer.number,
        posting_date: req.posting_date.format("%Y-%m-%d").to_string(),
        amount: ledger_amount(req.amount),
        description,
        external_document_number: req.bank_reference.as_deref(),
    }
}

/// Server-side and throttling errors are worth a rerun; other client errors
/// need the data fixed first.
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS
}

/// Logs each payment instead of sending it.
#[derive(Debug, Default)]
pub struct DryRunClient;

impl PaymentClient for DryRunClient {
    fn create_payment(&mut self, req: &PaymentRequest) -> Result<PaymentReceipt, SubmissionFailure> {
        tracing::info!(
            source = %req.source_type,
            row = req.source_row_index,
            date = %req.posting_date,
            amount = %req.amount,
            counterparty = %req.counterparty,
            "dry run: payment not sent"
        );
        Ok(PaymentReceipt {
            payment_id: Some(format!("dry-run-{}", req.source_row_index)),
        })
    }
}
