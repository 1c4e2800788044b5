use crate::result::PageTiming;
use crate::session::RenderSession;
use serde_json::Value;
use tracing::debug;

/// Milliseconds between fetch start and the end of the load event, or -1
/// when the browser exposes no navigation timing.
pub const NAVIGATION_TIMING_SCRIPT: &str = r#"
    (() => {
        var perf = window.performance || window.mozPerformance
            || window.msPerformance || window.webkitPerformance;
        if (perf && perf.timing) {
            return perf.timing.loadEventEnd - perf.timing.fetchStart;
        }
        return -1;
    })()
"#;

/// Read the load time of the page currently shown in `session`.
///
/// Never fails: a missing timing API, a script error or a negative reading
/// all come back as [`PageTiming::Unavailable`].
pub async fn measure<S: RenderSession + ?Sized>(session: &mut S) -> PageTiming {
    match session.evaluate(NAVIGATION_TIMING_SCRIPT).await {
        Ok(value) => timing_from_value(&value),
        Err(e) => {
            debug!("Navigation timing could not be read: {}", e);
            PageTiming::Unavailable
        }
    }
}

/// Convert a raw millisecond reading into seconds.
pub fn timing_from_value(value: &Value) -> PageTiming {
    match value.as_f64() {
        Some(millis) if millis.is_finite() && millis >= 0.0 => PageTiming::Measured(millis / 1000.0),
        _ => {
            debug!("Navigation timing reading rejected: {}", value);
            PageTiming::Unavailable
        }
    }
}
