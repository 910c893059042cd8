use indicatif::{ProgressBar, ProgressStyle};

/// A progress bar counting completed rounds, so the operator can see how far the run has got.
pub(crate) fn round_progress(rounds: usize) -> ProgressBar {
    let pb = ProgressBar::new(rounds as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] round {pos}/{len} [{elapsed_precise}]",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    pb.set_style(style);
    pb
}
