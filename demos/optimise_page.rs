//! Optimise a builder page and print what changed
//!
//! Run with: cargo run --example optimise_page [path/to/page.html] [--aggressive]
//!
//! Set `RUST_LOG=dom_optimiser=trace` to see every kept element and why.

use dom_optimiser::{DomOptimiser, OptimiseContext, OptimiserOptions};
use std::env;
use std::fs;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SAMPLE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Sample landing page</title><!-- page builder v3 --></head>
<body>
<section class="elementor-section" data-id="7f3a">
  <div class="elementor-container"><div class="elementor-row">
    <div class="elementor-column"><div class="elementor-column-wrap"><div class="elementor-widget-wrap">
      <div class="elementor-element elementor-widget-heading">
        <div class="elementor-widget-container"><h1>Welcome</h1></div>
      </div>
      <div class="elementor-element elementor-widget-spacer"><div class="elementor-spacer-inner"></div></div>
      <div class="elementor-element elementor-widget-image">
        <div class="elementor-widget-container"><img src="hero.png" alt="Hero"></div>
      </div>
      <div id="signup" class="elementor-widget-wrap"><a href="/join">Join</a></div>
    </div></div></div>
  </div></div>
</section>
<script>document.getElementById('signup').classList.add('ready');</script>
</body>
</html>"#;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dom_optimiser=debug")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let aggressive = args.iter().any(|a| a == "--aggressive");
    let html = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("failed to read {path}: {e}");
                std::process::exit(1);
            }
        },
        None => SAMPLE_PAGE.as_bytes().to_vec(),
    };

    let options = OptimiserOptions {
        enable_aggressive_mode: aggressive,
        ..OptimiserOptions::default()
    };
    let optimiser = DomOptimiser::with_options(options);
    let mut ctx = OptimiseContext::new(Duration::from_secs(5));

    match optimiser.process_bytes(&html, None, &mut ctx) {
        Ok(output) => {
            let report = &output.report;
            println!("{}", String::from_utf8_lossy(&output.html));
            println!();
            println!("=== Report ===");
            if let Some(reason) = report.skipped {
                println!("Skipped: {reason:?}");
            }
            println!("Passes:              {:?}", report.passes_applied);
            println!("Script-referenced:   {:?}", report.referenced_ids);
            println!("Wrappers unwrapped:  {}", report.wrappers_unwrapped);
            println!("Ghosts removed:      {}", report.ghosts_removed);
            println!("Comments removed:    {}", report.comments_removed);
            println!("Inner unwrapped:     {}", report.inner_unwrapped);
            println!("Flattened:           {}", report.containers_flattened);
            println!(
                "Size:                {} -> {} bytes ({:.1}% smaller)",
                report.original_len,
                report.output_len,
                report.reduction_pct()
            );
            println!("Elapsed:             {:?}", ctx.elapsed());
        }
        Err(e) => {
            eprintln!("optimisation failed (code {}): {e}", e.code());
            eprintln!("a host would serve the original page unchanged");
            std::process::exit(2);
        }
    }
}
