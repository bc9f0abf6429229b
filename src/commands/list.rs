//! List commands implementation

use spixfer_link::{available_links, LinkKind};

/// List all compiled-in buses and readiness lines
pub fn list_links() {
    let links = available_links();
    if links.is_empty() {
        println!("No link backends compiled in (recompile with features)");
        return;
    }

    println!("Available links:");
    println!();
    println!("{:<12} {:<6} Description", "Name", "Role");
    println!("{}", "-".repeat(72));

    for link in &links {
        let role = match link.kind {
            LinkKind::Bus => "bus",
            LinkKind::Ready => "ready",
            LinkKind::Both => "both",
        };
        println!("{:<12} {:<6} {}", link.name, role, link.description);
        if !link.aliases.is_empty() {
            println!("{:<12} {:<6} aliases: {}", "", "", link.aliases.join(", "));
        }
    }
}
