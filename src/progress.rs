use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

const FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

// Templates are static, so `with_template` cannot fail on them.
fn styled(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap()
}

/// Yellow braille spinner for a collection or download in flight.
fn spinner_style() -> ProgressStyle {
    styled("\x1b[33m{spinner}\x1b[0m {wide_msg}").tick_strings(FRAMES)
}

fn ok_style() -> ProgressStyle {
    styled("\x1b[32m✔\x1b[0m {wide_msg}")
}

fn err_style() -> ProgressStyle {
    styled("\x1b[31m✘\x1b[0m {wide_msg}")
}

/// Start a ticking spinner, attached to `mp` when given.
pub fn spinner(mp: Option<&MultiProgress>, msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let pb = match mp {
        Some(mp) => mp.add(pb),
        None => pb,
    };
    pb.set_style(spinner_style());
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Finish `pb` with the ok or error style depending on `ok`.
pub fn finish(pb: &ProgressBar, ok: bool, msg: String) {
    pb.set_style(if ok { ok_style() } else { err_style() });
    pb.finish_with_message(msg);
}
