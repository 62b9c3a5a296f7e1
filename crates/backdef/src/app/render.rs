//! Human-readable plan listing.

use std::fmt::Write as _;

use crate::app::directives::MemberEntry;
use crate::app::plan::Plan;

/// Render a plan as text, one line per member followed by staging groups and purge sets.
///
/// Member lines read `[DCL] name <- source`: `D` directory, `C` copy member,
/// `L` followed symlink, `_` when a flag is unset.
pub fn listing(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} ({})", plan.source.display(), plan.directives.mode);
    if let Some(archive) = &plan.archive {
        let _ = writeln!(out, "archive {}", archive.path.display());
    }
    for member in &plan.directives.members {
        let _ = writeln!(
            out,
            "[{}] {} <- {}",
            flags(member),
            member.name.display(),
            member.source.display()
        );
    }
    for group in &plan.directives.copy_groups {
        let entries: Vec<String> = group
            .entries
            .iter()
            .map(|entry| entry.name.display().to_string())
            .collect();
        let _ = writeln!(out, "stage {}/: {}", group.label, entries.join(" "));
    }
    for set in &plan.directives.purge_sets {
        let _ = writeln!(
            out,
            "purge {} under {} (keeping {})",
            set.patterns.join(" "),
            set.purge_root.display(),
            set.kept.len()
        );
    }
    out
}

fn flags(member: &MemberEntry) -> String {
    [
        (member.is_dir, 'D'),
        (member.group.is_some(), 'C'),
        (member.follow, 'L'),
    ]
    .into_iter()
    .map(|(set, flag)| if set { flag } else { '_' })
    .collect()
}
