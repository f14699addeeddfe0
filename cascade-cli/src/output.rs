// Terminal output for cascade commands
// Diagnostics go to stderr, flow output to stdout

use std::time::Duration;

use flow_service::FlowStatus;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

fn paint(style: &str, text: &str) -> String {
    format!("{}{}{}", style, text, RESET)
}

fn bold(color: &str, text: &str) -> String {
    format!("{}{}", BOLD, paint(color, text))
}

/// Print a right-aligned action followed by its subject: "  Loading cascade.yaml"
pub fn status(action: &str, subject: &str) {
    eprintln!("{} {}", bold(CYAN, &format!("{:>12}", action)), subject);
}

/// Print a header line
pub fn header(message: &str) {
    eprintln!("{}", paint(BOLD, &format!("==> {}", message)));
}

/// Print a final success line with checkmark
pub fn success(message: &str) {
    eprintln!("{} {}", bold(GREEN, "  \u{2713}"), message);
}

/// Print a final failure line with X
pub fn failure(message: &str) {
    eprintln!("{} {}", bold(RED, "  \u{2717}"), message);
}

/// Print a passed validation item
pub fn check(message: &str) {
    eprintln!("{} {}", paint(GREEN, "  \u{2713}"), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", paint(YELLOW, "  !"), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", bold(RED, "error:"), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", paint(CYAN, "  i"), message);
}

/// Print a muted detail line
pub fn dim(message: &str) {
    eprintln!("{}", paint(DIM, message));
}

/// Print the line announcing a flow start
pub fn flow_header(name: &str) {
    eprintln!("{} '{}'", bold(BLUE, "  Flow"), name);
}

/// Print the terminal state of one flow, green when it succeeded
pub fn flow_completed(name: &str, status: FlowStatus, duration: Duration) {
    let line = format!(
        "  Flow '{}' {} ({:.2}s)",
        name,
        status,
        duration.as_secs_f64()
    );
    let color = if status.is_successful() { GREEN } else { RED };
    eprintln!("{}", paint(color, &line));
}

/// Print one line of flow stdout, prefixed with the flow name
pub fn flow_output(flow: &str, line: &str) {
    println!("    {} | {}", flow, line);
}

/// Print one line of flow stderr in red
pub fn flow_error(flow: &str, line: &str) {
    eprintln!("{}", paint(RED, &format!("    {} | {}", flow, line)));
}
