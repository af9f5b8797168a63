use chrono::{DateTime, Duration, Utc};

use crate::{
    EngineError, MoneyCents, ResultEngine, TransactionKind,
    report::{self, Aggregation, Report, ReportRow, MAX_REPORT_DAYS, MAX_REPORT_ROWS},
};

use super::{Engine, TransactionQuery};

/// Parameters of one report request.
#[derive(Clone, Debug)]
pub struct ReportRequest {
    pub user_id: i64,
    pub kind: TransactionKind,
    /// Inclusive range over `effective_at`.
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub category_ids: Option<Vec<i64>>,
    pub subcategory_ids: Option<Vec<i64>>,
    pub amount_min: Option<MoneyCents>,
    pub amount_max: Option<MoneyCents>,
    pub comment_query: Option<String>,
    pub aggregation: Aggregation,
}

impl ReportRequest {
    /// A trailing-days request with no extra filters.
    pub fn last_days(
        user_id: i64,
        kind: TransactionKind,
        days: i64,
        aggregation: Aggregation,
    ) -> Self {
        let to = Utc::now();
        Self {
            user_id,
            kind,
            from: to - Duration::days(days),
            to,
            category_ids: None,
            subcategory_ids: None,
            amount_min: None,
            amount_max: None,
            comment_query: None,
            aggregation,
        }
    }
}

fn validate_request(request: &ReportRequest) -> ResultEngine<()> {
    if request.from > request.to {
        return Err(EngineError::InvalidRequest(
            "invalid range: from must be <= to".to_string(),
        ));
    }
    if request.to - request.from > Duration::days(MAX_REPORT_DAYS) {
        return Err(EngineError::InvalidRequest(format!(
            "range exceeds {MAX_REPORT_DAYS} days"
        )));
    }
    if request.aggregation == Aggregation::ByCategorySections
        && request.kind != TransactionKind::Expense
    {
        return Err(EngineError::InvalidRequest(
            "sections are available for expenses only".to_string(),
        ));
    }
    Ok(())
}

impl Engine {
    /// Fetches the filtered transaction set and aggregates it.
    ///
    /// Fetching is chronological ascending and capped at
    /// [`MAX_REPORT_ROWS`]; the summary always reflects the unaggregated
    /// set.
    pub async fn build_report(&self, request: &ReportRequest) -> ResultEngine<Report> {
        validate_request(request)?;

        let query = TransactionQuery {
            user_id: request.user_id,
            kind: Some(request.kind),
            from: Some(request.from),
            to: Some(request.to),
            category_ids: request.category_ids.clone(),
            subcategory_ids: request.subcategory_ids.clone(),
            amount_min: request.amount_min,
            amount_max: request.amount_max,
            comment_query: request.comment_query.clone(),
            limit: Some(MAX_REPORT_ROWS),
            offset: None,
            ascending: true,
        };
        let transactions = self.list_transactions(&query).await?;

        let mut ids: Vec<i64> = Vec::new();
        for tx in &transactions {
            ids.push(tx.category_id);
            if let Some(sub) = tx.subcategory_id {
                ids.push(sub);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        let names = self.category_names(&ids).await?;
        let resolve =
            |id: i64| -> String { names.get(&id).cloned().unwrap_or_else(|| id.to_string()) };

        let rows: Vec<ReportRow> = transactions
            .iter()
            .map(|tx| ReportRow {
                effective_at: tx.effective_at,
                category: resolve(tx.category_id),
                subcategory: tx.subcategory_id.map(resolve),
                amount: tx.amount,
                currency: tx.currency.clone(),
                comment: tx.comment.clone(),
            })
            .collect();

        tracing::info!(
            user_id = request.user_id,
            kind = request.kind.as_str(),
            mode = request.aggregation.as_str(),
            rows = rows.len(),
            "built report"
        );
        Ok(report::build_tables(
            request.kind,
            &rows,
            request.aggregation,
        ))
    }
}
