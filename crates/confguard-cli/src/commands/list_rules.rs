//! List rules command implementation.

use confguard_rules::{all_kinds, script_template, RuleKind, SCRIPT_LANGUAGES};

/// Runs the list-rules command.
pub fn run() {
    println!("Available rule kinds:\n");
    println!("{:<10} Description", "Type");
    println!("{}", "-".repeat(80));

    for kind in all_kinds() {
        println!("{:<10} {}", kind.name(), kind.description());
        println!("{:<10} keys: {}", "", kind.parameters().join(", "));
    }

    for kind in all_kinds() {
        if *kind == RuleKind::Script {
            continue;
        }
        println!("\nTemplate for `type = \"{}\"`:\n", kind.name());
        println!("{}", kind.template());
    }

    for language in SCRIPT_LANGUAGES {
        if let Some(template) = script_template(language) {
            println!("\nTemplate for `type = \"script\"`, `language = \"{language}\"`:\n");
            println!("{template}");
        }
    }

    println!("\nUse --rules to run only some rules by name, e.g.:");
    println!("  confguard check --rules vty-ssh-only,ntp-configured");
}
