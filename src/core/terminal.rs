use console::{Emoji, style};

pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
pub static MAIL: Emoji<'_, '_> = Emoji("📧 ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_step(step: &str) {
    println!("\n{} {}", ROCKET, style(step).bold());
}

pub fn print_target(company: &str, role: &str, email: &str) {
    println!(
        "{} {} for {}  {} {}",
        TARGET,
        style(company).bold().cyan(),
        style(role).italic(),
        MAIL,
        email
    );
}

pub fn print_banner() {
    let rule = "=".repeat(56);
    println!("{}", style(&rule).dim());
    println!("  {} {}", ROCKET, style("autopitch").bold().magenta());
    println!("{}", style(&rule).dim());
}
