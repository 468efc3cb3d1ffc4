//! Classification of dispatch results into metrics.
//!
//! ```text
//! info with measured duration → dispatch time (response code, or 500)
//! error                       → event count bucketed by the error
//! info, no error              → event count by response code
//! nothing                     → no metric
//! ```
//!
//! Duration is reported whenever it was measured, failed or not; only the
//! event count depends on whether an error occurred.

use crate::dispatch::engine::{DispatchError, DispatchExecutionInfo, INTERNAL_ERROR_CODE};
use crate::observability::metrics::{ReportArgs, StatsReporter};

/// Report metrics for one dispatch and return its final error.
///
/// Reporter failures are logged and never replace the dispatch error.
pub fn parse_dispatch_result_and_report_metrics(
    info: Option<&DispatchExecutionInfo>,
    reporter: &dyn StatsReporter,
    args: &ReportArgs,
    result: Result<(), DispatchError>,
) -> Result<(), DispatchError> {
    if let Some(info) = info {
        if let Some(duration) = info.measured_duration() {
            let code = info.valid_response_code().unwrap_or(INTERNAL_ERROR_CODE);
            if let Err(e) = reporter.report_event_dispatch_time(args, code, duration) {
                tracing::debug!(error = %e, "Failed to report dispatch time");
            }
        }
    }

    match (&result, info) {
        (Err(err), _) => reporter.report_event_count_for_error(err, args),
        (Ok(()), Some(info)) => {
            let code = info.valid_response_code().unwrap_or(INTERNAL_ERROR_CODE);
            if let Err(e) = reporter.report_event_count(args, code) {
                tracing::debug!(error = %e, "Failed to report event count");
            }
        }
        (Ok(()), None) => {}
    }

    result
}
