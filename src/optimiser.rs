//! Optimisation pipeline - runs the rewrite passes over one document
//!
//! # Pass Order
//!
//! Passes run in a fixed order on a single shared tree; each one observes the
//! tree as the previous one left it:
//!
//! 1. Script reference scan (diagnostic only, see [`crate::scanner`])
//! 2. Wrapper pruning ([`crate::wrappers`])
//! 3. Ghost node removal ([`crate::ghost`])
//! 4. Comment stripping ([`crate::comments`])
//! 5. Aggressive flattening, opt-in ([`crate::flatten`])
//!
//! # Entry Guard
//!
//! Inputs shorter than [`MIN_INPUT_LEN`] bytes, and calls with every pass
//! disabled, are returned verbatim without parsing.
//!
//! # Failure Handling
//!
//! [`DomOptimiser::process`] returns an explicit [`OptimiseError`] when the
//! document cannot be decoded, parsed into a usable tree, serialized, or
//! finished within the caller's budget. [`DomOptimiser::process_or_passthrough`]
//! turns every such failure into "serve the original input".
//!
//! # Example
//!
//! ```rust
//! use dom_optimiser::{DomOptimiser, OptimiserOptions};
//!
//! let page = format!(
//!     "<!DOCTYPE html><html><head><title>Demo</title></head><body>\
//!      <div class=\"elementor-widget-wrap\"><p>Hi</p></div>{}</body></html>",
//!     "<!-- padding comment -->".repeat(3)
//! );
//!
//! let optimiser = DomOptimiser::with_options(OptimiserOptions::default());
//! let output = optimiser.process(&page).expect("optimised");
//! assert!(output.html.contains("<body><p>Hi</p></body>"));
//! assert_eq!(output.report.wrappers_unwrapped, 1);
//! assert_eq!(output.report.comments_removed, 3);
//! ```

use markup5ever_rcdom::RcDom;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::comments::strip_comments;
use crate::error::OptimiseError;
use crate::flatten::{flatten_containers, unwrap_inner_wrappers};
use crate::ghost::remove_ghost_nodes;
use crate::parser::{
    decode_input, parse_document_str, serialize_document, serialize_document_as,
};
use crate::safety::PruneGuard;
use crate::scanner::ScriptReferenceScanner;
use crate::wrappers::prune_wrappers;

/// Inputs shorter than this many bytes are returned unchanged
pub const MIN_INPUT_LEN: usize = 100;

/// Setting key for wrapper pruning in a string settings store
pub const SETTING_WRAPPER: &str = "enable_wrapper";
/// Setting key for ghost node removal
pub const SETTING_GHOST: &str = "enable_ghost";
/// Setting key for comment stripping
pub const SETTING_COMMENTS: &str = "enable_comments";
/// Setting key for aggressive flattening
pub const SETTING_AGGRESSIVE: &str = "enable_aggressive";

/// Which passes run for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimiserOptions {
    /// Unwrap redundant column/widget wrappers
    pub enable_wrapper_pruning: bool,
    /// Delete visually empty builder elements
    pub enable_ghost_removal: bool,
    /// Delete every comment node
    pub enable_comment_stripping: bool,
    /// Unwrap inner wrappers and flatten single-child containers
    pub enable_aggressive_mode: bool,
}

impl Default for OptimiserOptions {
    /// The three conservative passes on, aggressive mode off
    fn default() -> Self {
        Self {
            enable_wrapper_pruning: true,
            enable_ghost_removal: true,
            enable_comment_stripping: true,
            enable_aggressive_mode: false,
        }
    }
}

impl OptimiserOptions {
    /// Every pass switched off; processing becomes a no-op
    pub fn all_disabled() -> Self {
        Self {
            enable_wrapper_pruning: false,
            enable_ghost_removal: false,
            enable_comment_stripping: false,
            enable_aggressive_mode: false,
        }
    }

    /// Every pass switched on, including aggressive mode
    pub fn all_enabled() -> Self {
        Self {
            enable_aggressive_mode: true,
            ..Self::default()
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.enable_wrapper_pruning
            || self.enable_ghost_removal
            || self.enable_comment_stripping
            || self.enable_aggressive_mode
    }

    /// Resolve options from a string settings store
    ///
    /// The conservative passes are enabled unless their setting exists with a
    /// value other than `on`. Aggressive mode is enabled only when its setting
    /// is explicitly `on`.
    ///
    /// ```rust
    /// use dom_optimiser::OptimiserOptions;
    ///
    /// let options = OptimiserOptions::from_settings(|key| match key {
    ///     "enable_comments" => Some("off".to_string()),
    ///     _ => None,
    /// });
    /// assert!(options.enable_wrapper_pruning);
    /// assert!(!options.enable_comment_stripping);
    /// assert!(!options.enable_aggressive_mode);
    /// ```
    pub fn from_settings<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_on = |value: String| value.trim().eq_ignore_ascii_case("on");
        let default_on = |key: &str| lookup(key).is_none_or(is_on);

        Self {
            enable_wrapper_pruning: default_on(SETTING_WRAPPER),
            enable_ghost_removal: default_on(SETTING_GHOST),
            enable_comment_stripping: default_on(SETTING_COMMENTS),
            enable_aggressive_mode: lookup(SETTING_AGGRESSIVE).is_some_and(is_on),
        }
    }
}

/// Cooperative wall-clock budget for one call
///
/// The budget is checked between passes and every 100 candidate nodes
/// within a pass. It is cooperative: a pass notices the deadline only at a
/// checkpoint, and parsing itself is not interrupted.
///
/// ```rust
/// use std::time::Duration;
/// use dom_optimiser::OptimiseContext;
///
/// let mut ctx = OptimiseContext::new(Duration::from_secs(5));
/// for _ in 0..1000 {
///     ctx.increment_and_check()?;
/// }
/// assert_eq!(ctx.node_count(), 1000);
/// # Ok::<(), dom_optimiser::OptimiseError>(())
/// ```
#[derive(Debug)]
pub struct OptimiseContext {
    start_time: Instant,
    /// Zero means no budget
    timeout: Duration,
    node_count: u32,
}

impl OptimiseContext {
    /// Create a context; `Duration::ZERO` disables the budget
    pub fn new(timeout: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            timeout,
            node_count: 0,
        }
    }

    /// A context without a budget
    pub fn unbounded() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Fail with `OptimiseError::Timeout` once the budget is spent
    pub fn check_timeout(&self) -> Result<(), OptimiseError> {
        if self.timeout.is_zero() {
            return Ok(());
        }

        if self.start_time.elapsed() > self.timeout {
            return Err(OptimiseError::Timeout);
        }

        Ok(())
    }

    /// Count one processed node, checking the budget every 100 nodes
    pub fn increment_and_check(&mut self) -> Result<(), OptimiseError> {
        self.node_count += 1;

        if self.node_count.is_multiple_of(100) {
            self.check_timeout()?;
        }

        Ok(())
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }
}

/// Why a call returned its input without parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Input empty or shorter than [`MIN_INPUT_LEN`] bytes
    InputTooShort,
    /// Every pass was disabled
    AllPassesDisabled,
}

/// A rewrite pass, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    ScriptScan,
    WrapperPruning,
    GhostRemoval,
    CommentStripping,
    InnerUnwrap,
    ContainerFlatten,
}

/// What one call did to the document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimiseReport {
    /// Set when the entry guard returned the input unchanged
    pub skipped: Option<SkipReason>,
    /// Passes that ran, in order
    pub passes_applied: Vec<Pass>,
    /// IDs that inline scripts look up by literal string
    pub referenced_ids: BTreeSet<String>,
    pub wrappers_unwrapped: usize,
    pub ghosts_removed: usize,
    pub comments_removed: usize,
    pub inner_unwrapped: usize,
    pub containers_flattened: usize,
    /// Input length in bytes
    pub original_len: usize,
    /// Output length in bytes
    pub output_len: usize,
}

impl OptimiseReport {
    fn passthrough(reason: SkipReason, len: usize) -> Self {
        Self {
            skipped: Some(reason),
            original_len: len,
            output_len: len,
            ..Default::default()
        }
    }

    /// Total number of nodes removed or unwrapped
    pub fn nodes_changed(&self) -> usize {
        self.wrappers_unwrapped
            + self.ghosts_removed
            + self.comments_removed
            + self.inner_unwrapped
            + self.containers_flattened
    }

    /// Size reduction of the output relative to the input, in percent
    pub fn reduction_pct(&self) -> f64 {
        if self.original_len == 0 {
            return 0.0;
        }
        (self.original_len as f64 - self.output_len as f64) / self.original_len as f64 * 100.0
    }
}

/// Rewritten document plus the report for the call
#[derive(Debug, Clone)]
pub struct OptimiseOutput<T = String> {
    pub html: T,
    pub report: OptimiseReport,
}

/// Runs the configured passes over one document per call
///
/// The optimiser holds configuration only. Every call parses its own tree
/// and builds its own referenced-ID set, so one instance can serve any
/// number of documents, and separate instances can run on separate threads.
#[derive(Debug, Clone, Default)]
pub struct DomOptimiser {
    options: OptimiserOptions,
    guard: PruneGuard,
    scanner: ScriptReferenceScanner,
}

impl DomOptimiser {
    /// Create an optimiser with default options
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: OptimiserOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Create an optimiser from already-built components
    pub fn from_parts(
        options: OptimiserOptions,
        guard: PruneGuard,
        scanner: ScriptReferenceScanner,
    ) -> Self {
        Self {
            options,
            guard,
            scanner,
        }
    }

    pub fn options(&self) -> &OptimiserOptions {
        &self.options
    }

    /// Entry guard: the reason to skip processing, if any
    pub fn skip_reason(&self, input_len: usize) -> Option<SkipReason> {
        if input_len < MIN_INPUT_LEN {
            Some(SkipReason::InputTooShort)
        } else if !self.options.any_enabled() {
            Some(SkipReason::AllPassesDisabled)
        } else {
            None
        }
    }

    /// Optimise a UTF-8 document with no time budget
    pub fn process(&self, html: &str) -> Result<OptimiseOutput, OptimiseError> {
        self.process_with_context(html, &mut OptimiseContext::unbounded())
    }

    /// Optimise a UTF-8 document within the context's budget
    pub fn process_with_context(
        &self,
        html: &str,
        ctx: &mut OptimiseContext,
    ) -> Result<OptimiseOutput, OptimiseError> {
        if let Some(reason) = self.skip_reason(html.len()) {
            debug!(?reason, len = html.len(), "entry guard returned input unchanged");
            return Ok(OptimiseOutput {
                html: html.to_string(),
                report: OptimiseReport::passthrough(reason, html.len()),
            });
        }

        let dom = parse_document_str(html)?;
        ctx.check_timeout()?;

        let mut report = self.optimise_dom(&dom, ctx)?;
        let output = serialize_document(&dom)?;
        ctx.check_timeout()?;

        report.original_len = html.len();
        report.output_len = output.len();
        debug!(
            nodes_changed = report.nodes_changed(),
            original_len = report.original_len,
            output_len = report.output_len,
            "document optimised"
        );

        Ok(OptimiseOutput {
            html: output,
            report,
        })
    }

    /// Optimise a byte payload, honouring its declared charset
    ///
    /// The document is decoded by the charset cascade (Content-Type, meta
    /// tag, UTF-8), rewritten, and encoded back into the same charset so the
    /// document's own declaration stays truthful. A `<script>` or `<style>`
    /// body the charset cannot represent is an `EncodingError`.
    pub fn process_bytes(
        &self,
        html: &[u8],
        content_type: Option<&str>,
        ctx: &mut OptimiseContext,
    ) -> Result<OptimiseOutput<Vec<u8>>, OptimiseError> {
        if let Some(reason) = self.skip_reason(html.len()) {
            debug!(?reason, len = html.len(), "entry guard returned input unchanged");
            return Ok(OptimiseOutput {
                html: html.to_vec(),
                report: OptimiseReport::passthrough(reason, html.len()),
            });
        }

        let (text, encoding) = decode_input(html, content_type)?;
        let dom = parse_document_str(&text)?;
        ctx.check_timeout()?;

        let mut report = self.optimise_dom(&dom, ctx)?;
        let bytes = serialize_document_as(&dom, encoding)?;
        ctx.check_timeout()?;

        report.original_len = html.len();
        report.output_len = bytes.len();
        debug!(
            nodes_changed = report.nodes_changed(),
            charset = encoding.name(),
            output_len = report.output_len,
            "document optimised"
        );

        Ok(OptimiseOutput {
            html: bytes,
            report,
        })
    }

    /// Optimise, serving the original input on any failure
    pub fn process_or_passthrough(&self, html: &str) -> String {
        self.process_or_passthrough_with_context(html, &mut OptimiseContext::unbounded())
    }

    /// Optimise within the context's budget, serving the original input on
    /// any failure, a spent budget included
    pub fn process_or_passthrough_with_context(
        &self,
        html: &str,
        ctx: &mut OptimiseContext,
    ) -> String {
        match self.process_with_context(html, ctx) {
            Ok(output) => output.html,
            Err(err) => {
                warn!(error = %err, code = err.code(), "optimisation failed, serving original");
                html.to_string()
            }
        }
    }

    /// Run the enabled passes over an already-parsed tree
    ///
    /// The entry guard does not apply here; the caller chose to parse.
    pub fn optimise_dom(
        &self,
        dom: &RcDom,
        ctx: &mut OptimiseContext,
    ) -> Result<OptimiseReport, OptimiseError> {
        let mut report = OptimiseReport::default();

        report.referenced_ids = self.scanner.scan(dom);
        report.passes_applied.push(Pass::ScriptScan);
        debug!(count = report.referenced_ids.len(), "script references collected");
        ctx.check_timeout()?;

        if self.options.enable_wrapper_pruning {
            report.wrappers_unwrapped = prune_wrappers(dom, &self.guard, ctx)?;
            report.passes_applied.push(Pass::WrapperPruning);
            ctx.check_timeout()?;
        }

        if self.options.enable_ghost_removal {
            report.ghosts_removed = remove_ghost_nodes(dom, ctx)?;
            report.passes_applied.push(Pass::GhostRemoval);
            ctx.check_timeout()?;
        }

        if self.options.enable_comment_stripping {
            report.comments_removed = strip_comments(dom, ctx)?;
            report.passes_applied.push(Pass::CommentStripping);
            ctx.check_timeout()?;
        }

        if self.options.enable_aggressive_mode {
            report.inner_unwrapped = unwrap_inner_wrappers(dom, &self.guard, ctx)?;
            report.passes_applied.push(Pass::InnerUnwrap);
            ctx.check_timeout()?;

            report.containers_flattened = flatten_containers(dom, &self.guard, ctx)?;
            report.passes_applied.push(Pass::ContainerFlatten);
            ctx.check_timeout()?;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wrap a body fragment in a document long enough to pass the entry guard
    fn page(body: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><title>Optimiser test page</title>\
             <meta name=\"description\" content=\"padding\"></head><body>{body}</body></html>"
        )
    }

    fn body_of(html: &str) -> &str {
        let start = html.find("<body>").map(|i| i + "<body>".len()).unwrap_or(0);
        let end = html.rfind("</body>").unwrap_or(html.len());
        &html[start..end]
    }

    fn run(options: OptimiserOptions, body: &str) -> OptimiseOutput {
        DomOptimiser::with_options(options)
            .process(&page(body))
            .expect("processing succeeds")
    }

    #[test]
    fn test_wrapper_unwrapped() {
        let out = run(
            OptimiserOptions::default(),
            "<div class=\"elementor-widget-wrap\"><p>Hi</p></div>",
        );
        assert_eq!(body_of(&out.html), "<p>Hi</p>");
        assert_eq!(out.report.wrappers_unwrapped, 1);
    }

    #[test]
    fn test_wrapper_with_id_retained() {
        let body = "<div id=\"x\" class=\"elementor-widget-wrap\"><p>Hi</p></div>";
        let out = run(OptimiserOptions::default(), body);
        assert_eq!(body_of(&out.html), body);
        assert_eq!(out.report.nodes_changed(), 0);
    }

    #[test]
    fn test_ghost_removed() {
        let out = run(
            OptimiserOptions::default(),
            "<p>a</p><div class=\"elementor-element\"></div><p>b</p>",
        );
        assert_eq!(body_of(&out.html), "<p>a</p><p>b</p>");
        assert_eq!(out.report.ghosts_removed, 1);
    }

    #[test]
    fn test_ghost_with_image_retained() {
        let body = "<div class=\"elementor-element\"><img src=\"a.png\"></div>";
        let out = run(OptimiserOptions::default(), body);
        assert_eq!(body_of(&out.html), body);
    }

    #[test]
    fn test_comment_stripped() {
        let out = run(OptimiserOptions::default(), "<!-- note --><p>Text</p>");
        assert_eq!(body_of(&out.html), "<p>Text</p>");
        assert_eq!(out.report.comments_removed, 1);
    }

    #[test]
    fn test_short_input_returned_verbatim() {
        let html = "<div class=\"elementor-widget-wrap\"><p>Hi</p></div>";
        let out = DomOptimiser::new().process(html).expect("guarded");
        assert_eq!(out.html, html);
        assert_eq!(out.report.skipped, Some(SkipReason::InputTooShort));
        assert!(out.report.passes_applied.is_empty());
    }

    #[test]
    fn test_all_disabled_returned_verbatim() {
        let html = page("<!-- c --><div class=\"elementor-widget-wrap\"><p>Hi</p></div>");
        let out = DomOptimiser::with_options(OptimiserOptions::all_disabled())
            .process(&html)
            .expect("guarded");
        assert_eq!(out.html, html);
        assert_eq!(out.report.skipped, Some(SkipReason::AllPassesDisabled));
    }

    #[test]
    fn test_entry_guard_boundary() {
        let optimiser = DomOptimiser::new();
        assert_eq!(optimiser.skip_reason(99), Some(SkipReason::InputTooShort));
        assert_eq!(optimiser.skip_reason(100), None);
        assert_eq!(optimiser.skip_reason(0), Some(SkipReason::InputTooShort));
    }

    #[test]
    fn test_only_enabled_passes_run() {
        let options = OptimiserOptions {
            enable_wrapper_pruning: false,
            enable_ghost_removal: false,
            enable_comment_stripping: true,
            enable_aggressive_mode: false,
        };
        let out = run(
            options,
            "<!-- c --><div class=\"elementor-widget-wrap\"><div class=\"elementor-element\"></div></div>",
        );
        assert_eq!(
            body_of(&out.html),
            "<div class=\"elementor-widget-wrap\"><div class=\"elementor-element\"></div></div>"
        );
        assert_eq!(
            out.report.passes_applied,
            vec![Pass::ScriptScan, Pass::CommentStripping]
        );
    }

    #[test]
    fn test_aggressive_passes_run_last() {
        let out = run(OptimiserOptions::all_enabled(), "<p>x</p>");
        assert_eq!(
            out.report.passes_applied,
            vec![
                Pass::ScriptScan,
                Pass::WrapperPruning,
                Pass::GhostRemoval,
                Pass::CommentStripping,
                Pass::InnerUnwrap,
                Pass::ContainerFlatten,
            ]
        );
    }

    #[test]
    fn test_referenced_ids_reported_but_not_gating() {
        let out = run(
            OptimiserOptions::default(),
            "<div class=\"elementor-widget-wrap\"><p>Hi</p></div>\
             <script>document.getElementById('elementor-widget-wrap');</script>",
        );
        assert!(out.report.referenced_ids.contains("elementor-widget-wrap"));
        assert_eq!(out.report.wrappers_unwrapped, 1);
    }

    #[test]
    fn test_invalid_bytes_are_encoding_error() {
        let optimiser = DomOptimiser::new();
        let mut ctx = OptimiseContext::unbounded();
        let mut bytes = page("<p>x</p>").into_bytes();
        bytes.push(0xFF);
        let result = optimiser.process_bytes(&bytes, Some("text/html; charset=utf-8"), &mut ctx);
        assert!(matches!(result, Err(OptimiseError::EncodingError(_))));
    }

    #[test]
    fn test_process_bytes_keeps_declared_charset() {
        let html = page("<meta charset=\"ISO-8859-1\"><div class=\"elementor-widget-wrap\"><p>Caf\u{e9}</p></div>");
        let (latin1, _, _) = encoding_rs::WINDOWS_1252.encode(&html);
        let out = DomOptimiser::new()
            .process_bytes(&latin1, None, &mut OptimiseContext::unbounded())
            .expect("latin-1 processed");
        assert!(out.html.windows(5).any(|w| w == b"Caf\xE9<"));
        assert_eq!(out.report.wrappers_unwrapped, 1);
    }

    #[test]
    fn test_expired_budget_times_out() {
        let html = page(&"<div class=\"elementor-widget-wrap\"><p>x</p></div>".repeat(500));
        let optimiser = DomOptimiser::new();
        let mut ctx = OptimiseContext::new(Duration::from_nanos(1));
        std::thread::sleep(Duration::from_millis(1));
        let result = optimiser.process_with_context(&html, &mut ctx);
        assert!(matches!(result, Err(OptimiseError::Timeout)));
    }

    #[test]
    fn test_passthrough_returns_original_on_timeout() {
        let optimiser = DomOptimiser::new();
        let html = page(&"<div class=\"elementor-widget-wrap\"><p>x</p></div>".repeat(500));
        let mut ctx = OptimiseContext::new(Duration::from_nanos(1));
        std::thread::sleep(Duration::from_millis(1));

        assert_eq!(optimiser.process_or_passthrough_with_context(&html, &mut ctx), html);
    }

    #[test]
    fn test_passthrough_serves_rewrite_on_success() {
        let optimiser = DomOptimiser::new();
        let html = page("<div class=\"elementor-widget-wrap\"><p>x</p></div>");
        assert!(optimiser.process_or_passthrough(&html).len() < html.len());

        // A comment-only page still parses: the tree builder supplies the skeleton.
        let comment_only = format!("<!--{}-->", "x".repeat(120));
        assert_eq!(
            optimiser.process_or_passthrough(&comment_only),
            "<html><head></head><body></body></html>"
        );
    }

    #[test]
    fn test_from_settings_defaults() {
        let options = OptimiserOptions::from_settings(|_| None);
        assert_eq!(options, OptimiserOptions::default());

        let options = OptimiserOptions::from_settings(|key| match key {
            SETTING_WRAPPER => Some("".to_string()),
            SETTING_AGGRESSIVE => Some(" ON ".to_string()),
            _ => Some("on".to_string()),
        });
        assert!(!options.enable_wrapper_pruning);
        assert!(options.enable_ghost_removal);
        assert!(options.enable_aggressive_mode);
    }

    #[test]
    fn test_report_reduction() {
        let report = OptimiseReport {
            original_len: 200,
            output_len: 150,
            ..Default::default()
        };
        assert!((report.reduction_pct() - 25.0).abs() < f64::EPSILON);
        assert_eq!(OptimiseReport::default().reduction_pct(), 0.0);
    }
}
