use async_trait::async_trait;
use colored::*;
use std::io::IsTerminal;
use crate::auth::{Navigator, SessionNotice};

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "❌".red().bold(), msg.red());
}

/// Navigator for the terminal: notices are printed, routes become hints
///
/// When stdin is a terminal the notice waits for Enter before returning;
/// otherwise it only prints.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNavigator {
    wait_for_ack: bool,
}

impl ConsoleNavigator {
    pub fn new() -> Self {
        Self {
            wait_for_ack: std::io::stdin().is_terminal(),
        }
    }
}

impl Default for ConsoleNavigator {
    fn default() -> Self {
        Self::new()
    }
}

/// Hint printed when the session sends the user to `route`
fn sign_in_hint(route: &str) -> String {
    format!("Run {} to continue ({})", "chatroom sign-in".cyan(), route)
}

#[async_trait]
impl Navigator for ConsoleNavigator {
    async fn present_notice(&self, notice: &SessionNotice) {
        println!();
        print_error(&notice.title);
        print_step(&notice.message);

        if self.wait_for_ack {
            print_step("Press Enter to continue");
            let ack = tokio::task::spawn_blocking(|| {
                let mut line = String::new();
                std::io::stdin().read_line(&mut line).map(|_| ())
            })
            .await;
            if let Ok(Err(e)) = ack {
                tracing::debug!("Could not read acknowledgement: {}", e);
            }
        }
    }

    // The only route the auth layer navigates to is the configured login route
    fn navigate(&self, route: &str) {
        print_step(&sign_in_hint(route));
    }
}
