use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use auditlog_domain::{NormalizationError, normalize_in};
use auditlog_types::{
    AuditReport, AuditType, CanonicalAuditRecord, EmptyReportPolicy, Environment, FailureKind,
    REASON_EMPTY_REPORT, REASON_INVALID_CONFIG, REASON_NON_PRODUCTION, REASON_NOTIFICATION_ERROR,
    REASON_QUERY_ERROR, REASON_SKIPPED_ENTRIES, REASON_STORAGE_ERROR, REASON_UNEXPECTED_ERROR,
    RUN_RECEIPT_SCHEMA_V1, RunConfig, RunCounts, RunFailure, RunReceipt, RunStatus, ToolMeta,
};

use crate::aggregate::aggregate;
use crate::classify::classify;
use crate::config::{ConfigError, resolve_time_zone, validate_run_config};
use crate::delivery::{
    Attachment, EntryStream, FileStore, Notification, NotificationError, Notifier, QueryError,
    QuerySelector, StorageError,
};
use crate::fingerprint::dedupe_records;
use crate::render::{RenderedReport, local_date, render_report};

/// Inputs of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditPlan {
    pub config: RunConfig,
    /// Anchors every `age_days` and dates the report file.
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub receipt: RunReceipt,
    /// The rendered report, when the run got that far.
    pub rendered: Option<RenderedReport>,
}

/// A run-level failure. Per-entry problems are skipped, never raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("invalid run config: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error("unexpected error during {stage}: {detail}")]
    Unexpected { stage: &'static str, detail: String },
}

impl RunError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RunError::Config(_) => FailureKind::Config,
            RunError::Query(_) => FailureKind::Query,
            RunError::Storage(_) => FailureKind::Storage,
            RunError::Notification(_) => FailureKind::Notification,
            RunError::Unexpected { .. } => FailureKind::Unexpected,
        }
    }

    /// Receipt reason token for this failure.
    pub fn reason(&self) -> &'static str {
        match self {
            RunError::Config(_) => REASON_INVALID_CONFIG,
            RunError::Query(_) => REASON_QUERY_ERROR,
            RunError::Storage(_) => REASON_STORAGE_ERROR,
            RunError::Notification(_) => REASON_NOTIFICATION_ERROR,
            RunError::Unexpected { .. } => REASON_UNEXPECTED_ERROR,
        }
    }

    pub fn to_failure(&self) -> RunFailure {
        let (code, detail) = match self {
            RunError::Config(e) => ("INVALID_CONFIG".to_string(), e.to_string()),
            RunError::Query(e) => (e.code.clone(), e.detail.clone()),
            RunError::Storage(e) => (e.code.clone(), e.detail.clone()),
            RunError::Notification(e) => (e.code.clone(), e.detail.clone()),
            RunError::Unexpected { stage, detail } => {
                ("UNEXPECTED_ERROR".to_string(), format!("{stage}: {detail}"))
            }
        };
        RunFailure {
            kind: self.kind(),
            code,
            detail,
        }
    }
}

/// A report built from an entry stream, with the counts of how it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub report: AuditReport,
    pub counts: RunCounts,
}

enum EntrySkip {
    Query(QueryError),
    Normalize(NormalizationError),
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Normalize, dedupe, aggregate and classify a stream of entries.
///
/// Entries are normalized on the rayon pool. Each one is tagged with its
/// position in the stream first, and results are put back in stream order
/// before aggregation, so ties in the sort keep query order. Entries that
/// fail to read or normalize are logged and counted as skipped. Offset-less
/// change dates are read in `zone`.
pub fn assemble_report(
    entries: EntryStream,
    audit_type: AuditType,
    now: DateTime<Utc>,
    zone: Tz,
    dedupe: bool,
) -> Assembly {
    let mut results: Vec<(usize, Result<CanonicalAuditRecord, EntrySkip>)> = entries
        .enumerate()
        .par_bridge()
        .map(|(seq, item)| {
            let outcome = item.map_err(EntrySkip::Query).and_then(|entry| {
                normalize_in(&entry, audit_type, now, zone).map_err(EntrySkip::Normalize)
            });
            (seq, outcome)
        })
        .collect();
    results.sort_unstable_by_key(|(seq, _)| *seq);

    let mut counts = RunCounts {
        queried: saturating_u32(results.len()),
        ..RunCounts::default()
    };

    let mut records = Vec::with_capacity(results.len());
    for (seq, outcome) in results {
        match outcome {
            Ok(rec) => records.push(rec),
            Err(EntrySkip::Query(e)) => {
                counts.skipped += 1;
                warn!(seq, code = %e.code, detail = %e.detail, "skipping unreadable audit entry");
            }
            Err(EntrySkip::Normalize(e)) => {
                counts.skipped += 1;
                warn!(entry_id = %e.entry_id(), error = %e, "skipping audit entry");
            }
        }
    }
    counts.normalized = saturating_u32(records.len());

    if dedupe {
        let (kept, dropped) = dedupe_records(records);
        if dropped > 0 {
            debug!(dropped, "collapsed duplicate audit records");
        }
        counts.duplicates = dropped;
        records = kept;
    }

    let report = classify(aggregate(audit_type, records));
    counts.reported = saturating_u32(report.len());
    Assembly { report, counts }
}

/// Runs `f`, turning a panic into [`RunError::Unexpected`].
fn guard<T>(
    stage: &'static str,
    f: impl FnOnce() -> Result<T, RunError>,
) -> Result<T, RunError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(RunError::Unexpected {
            stage,
            detail: panic_detail(&*payload),
        })
    })
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

/// The run boundary: query, build, render and deliver one report.
///
/// [`AuditPipeline::run`] never fails. Every run ends in a [`RunReceipt`]
/// whose status is success, partial, skipped or fatal.
pub struct AuditPipeline<'a> {
    selector: &'a dyn QuerySelector,
    store: &'a dyn FileStore,
    notifier: &'a dyn Notifier,
    tool: ToolMeta,
}

impl<'a> AuditPipeline<'a> {
    pub fn new(
        selector: &'a dyn QuerySelector,
        store: &'a dyn FileStore,
        notifier: &'a dyn Notifier,
        tool: ToolMeta,
    ) -> Self {
        Self {
            selector,
            store,
            notifier,
            tool,
        }
    }

    pub fn run(&self, plan: &AuditPlan) -> RunOutcome {
        let config = &plan.config;
        let mut receipt = RunReceipt {
            schema: RUN_RECEIPT_SCHEMA_V1.to_string(),
            tool: self.tool.clone(),
            audit_type: config.audit_type,
            status: RunStatus::Success,
            counts: RunCounts::default(),
            has_recent_change: false,
            subject: None,
            file_name: None,
            file_handle: None,
            reasons: vec![],
            failure: None,
            timing: None,
        };

        info!(
            audit_type = config.audit_type.as_str(),
            environment = config.environment.as_str(),
            "starting audit run"
        );

        let checked =
            validate_run_config(config).and_then(|()| resolve_time_zone(&config.time_zone));
        let zone = match checked {
            Ok(zone) => zone,
            Err(e) => {
                let err = RunError::from(e);
                log_failure(&err);
                receipt.status = RunStatus::Fatal;
                receipt.reasons.push(err.reason().to_string());
                receipt.failure = Some(err.to_failure());
                return RunOutcome {
                    receipt,
                    rendered: None,
                };
            }
        };

        if config.restrict_to_production && config.environment != Environment::Production {
            info!(
                environment = config.environment.as_str(),
                "run is restricted to production; skipping"
            );
            receipt.status = RunStatus::Skipped;
            receipt.reasons.push(REASON_NON_PRODUCTION.to_string());
            return RunOutcome {
                receipt,
                rendered: None,
            };
        }

        let mut rendered = None;
        if let Err(err) = self.execute(plan, zone, &mut receipt, &mut rendered) {
            log_failure(&err);
            receipt.status = RunStatus::Fatal;
            receipt.reasons.push(err.reason().to_string());
            receipt.failure = Some(err.to_failure());
        }

        info!(
            status = receipt.status.as_str(),
            queried = receipt.counts.queried,
            skipped = receipt.counts.skipped,
            reported = receipt.counts.reported,
            "audit run finished"
        );
        RunOutcome { receipt, rendered }
    }

    fn execute(
        &self,
        plan: &AuditPlan,
        zone: Tz,
        receipt: &mut RunReceipt,
        rendered: &mut Option<RenderedReport>,
    ) -> Result<(), RunError> {
        let config = &plan.config;
        let audit_type = config.audit_type;

        let entries = guard("query", || Ok(self.selector.select(audit_type)?))?;
        let Assembly { report, counts } = guard("normalize", || {
            Ok(assemble_report(entries, audit_type, plan.now, zone, config.dedupe))
        })?;

        receipt.counts = counts;
        receipt.has_recent_change = report.has_recent_change;
        if receipt.counts.skipped > 0 {
            receipt.reasons.push(REASON_SKIPPED_ENTRIES.to_string());
        }

        let out = render_report(&report, local_date(plan.now, zone));
        receipt.subject = Some(out.subject.clone());
        receipt.file_name = Some(out.file_name.clone());
        debug!(file_name = %out.file_name, subject = %out.subject, rows = report.len(), "rendered report");

        if report.is_empty() && config.empty_report == EmptyReportPolicy::Skip {
            info!("report is empty; nothing delivered");
            receipt.status = RunStatus::Skipped;
            receipt.reasons.push(REASON_EMPTY_REPORT.to_string());
            *rendered = Some(out);
            return Ok(());
        }

        let handle = guard("store", || {
            Ok(self
                .store
                .store(out.csv.as_bytes(), &out.file_name, config.folder_id)?)
        })?;
        info!(file_handle = %handle, folder_id = config.folder_id, "stored report file");
        receipt.file_handle = Some(handle.0.clone());

        let notification = Notification {
            author_id: config.author_id,
            recipients: config.recipients.clone(),
            subject: out.subject.clone(),
            body_html: crate::html::render_email_body(&out.html),
            attachments: vec![Attachment {
                file_name: out.file_name.clone(),
                handle,
                bytes: out.csv.clone().into_bytes(),
            }],
        };
        guard("notify", || Ok(self.notifier.notify(&notification)?))?;
        info!(
            recipients = notification.recipients.len(),
            subject = %notification.subject,
            "sent report notification"
        );

        receipt.status = if receipt.counts.skipped > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };
        *rendered = Some(out);
        Ok(())
    }
}

fn log_failure(err: &RunError) {
    match err {
        RunError::Unexpected { stage, detail } => {
            error!(stage = %stage, detail = %detail, "unexpected error");
        }
        other => {
            let failure = other.to_failure();
            error!(
                kind = failure.kind.as_str(),
                code = %failure.code,
                detail = %failure.detail,
                "system error"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditlog_testkit::{fixed_now, sample_entries};
    use auditlog_types::{AgeDays, RawAuditEntry};

    fn stream(items: Vec<Result<RawAuditEntry, QueryError>>) -> EntryStream {
        Box::new(items.into_iter())
    }

    #[test]
    fn assembles_three_workflows_newest_first() {
        let entries = sample_entries::three_workflows()
            .into_iter()
            .map(Ok)
            .collect();
        let Assembly { report, counts } =
            assemble_report(stream(entries), AuditType::Workflows, fixed_now(), Tz::UTC, true);

        let names: Vec<_> = report
            .records
            .iter()
            .map(|r| r.workflow_name.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["Approval Routing", "Invoice Approval", "Credit Hold"]);
        let ages: Vec<_> = report.records.iter().map(|r| r.age_days).collect();
        assert_eq!(ages, vec![AgeDays::Days(0), AgeDays::Days(1), AgeDays::Days(2)]);
        assert!(report.has_recent_change);
        assert_eq!(
            counts,
            RunCounts {
                queried: 3,
                normalized: 3,
                skipped: 0,
                duplicates: 0,
                reported: 3,
            }
        );
    }

    #[test]
    fn skips_bad_entries_and_keeps_the_rest() {
        let entries = vec![
            Ok(sample_entries::script("1", fixed_now())),
            Err(QueryError::new("SSS_RECORD_GONE", "row vanished")),
            Ok(sample_entries::without_actor(AuditType::Scripts, "3")),
            Ok(sample_entries::workflow("4", "Wrong Type", fixed_now())),
        ];
        let Assembly { report, counts } =
            assemble_report(stream(entries), AuditType::Scripts, fixed_now(), Tz::UTC, true);

        assert_eq!(report.len(), 1);
        assert_eq!(report.records[0].id, "1");
        assert_eq!(counts.queried, 4);
        assert_eq!(counts.normalized, 1);
        assert_eq!(counts.skipped, 3);
    }

    #[test]
    fn duplicates_collapse_only_when_enabled() {
        let dup = || Ok(sample_entries::feature("9", fixed_now(), "F", "T"));

        let deduped = assemble_report(
            stream(vec![dup(), dup()]),
            AuditType::Features,
            fixed_now(),
            Tz::UTC,
            true,
        );
        assert_eq!(deduped.report.len(), 1);
        assert_eq!(deduped.counts.duplicates, 1);

        let kept = assemble_report(
            stream(vec![dup(), dup()]),
            AuditType::Features,
            fixed_now(),
            Tz::UTC,
            false,
        );
        assert_eq!(kept.report.len(), 2);
        assert_eq!(kept.counts.duplicates, 0);
    }

    #[test]
    fn empty_stream_is_an_empty_report() {
        let Assembly { report, counts } =
            assemble_report(stream(vec![]), AuditType::Workflows, fixed_now(), Tz::UTC, true);
        assert!(report.is_empty());
        assert!(!report.has_recent_change);
        assert_eq!(counts, RunCounts::default());
    }

    #[test]
    fn config_errors_map_to_config_failures() {
        let err = RunError::from(ConfigError::UnknownTimeZone("Mars/Olympus".to_string()));
        assert_eq!(err.kind(), FailureKind::Config);
        assert_eq!(err.reason(), REASON_INVALID_CONFIG);
        let failure = err.to_failure();
        assert_eq!(failure.code, "INVALID_CONFIG");
        assert_eq!(failure.detail, "time zone 'Mars/Olympus' is not a known IANA zone");
    }

    #[test]
    fn guard_converts_panics() {
        let err = guard::<()>("store", || panic!("disk on fire")).unwrap_err();
        assert_eq!(
            err,
            RunError::Unexpected {
                stage: "store",
                detail: "disk on fire".to_string(),
            }
        );
        assert_eq!(err.kind(), FailureKind::Unexpected);
        assert_eq!(err.reason(), REASON_UNEXPECTED_ERROR);
    }

    #[test]
    fn guard_passes_errors_through() {
        let err = guard::<()>("notify", || {
            Err(NotificationError::new("SSS_INVALID_EMAIL", "bad address").into())
        })
        .unwrap_err();
        let failure = err.to_failure();
        assert_eq!(failure.kind, FailureKind::Notification);
        assert_eq!(failure.code, "SSS_INVALID_EMAIL");
        assert_eq!(failure.detail, "bad address");
    }

    #[test]
    fn panic_detail_reads_formatted_messages() {
        let err = guard::<()>("query", || panic!("row {} missing", 7)).unwrap_err();
        assert_eq!(err.to_failure().detail, "query: row 7 missing");
    }
}
