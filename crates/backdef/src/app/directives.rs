//! Assembly of work items into member lists, copy staging groups, and purge sets.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::app::implied::preserved_part;
use crate::domain::errors::DefinitionError;
use crate::domain::model::{Destination, Marker, Mode, PatternRecord, WorkItem};

/// One entry handed to the archiver or synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberEntry {
    pub source: PathBuf,
    pub implied_root: PathBuf,
    /// Destination-relative name; copy members live under their staging directory.
    pub name: PathBuf,
    pub group: Option<String>,
    pub follow: bool,
    pub is_dir: bool,
}

/// Sources regrouped into one staging directory before archiving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyGroup {
    pub label: String,
    /// Entries named relative to the staging directory.
    pub entries: Vec<MemberEntry>,
}

/// Inputs for pruning destination files that no source produces anymore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeSet {
    pub implied_root: PathBuf,
    /// Where `implied_root` is mirrored at the destination.
    pub purge_root: PathBuf,
    /// Globs, relative to `purge_root`, naming the purge candidates.
    pub patterns: Vec<String>,
    /// Names, relative to `purge_root`, that sources still provide.
    pub kept: BTreeSet<PathBuf>,
}

/// Final work lists for one definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directives {
    pub mode: Mode,
    pub members: Vec<MemberEntry>,
    pub copy_groups: Vec<CopyGroup>,
    pub purge_sets: Vec<PurgeSet>,
}

#[derive(Debug, Clone)]
pub struct DirectiveBuilder {
    mode: Mode,
    destination: Option<Destination>,
    members: Vec<MemberEntry>,
    copy_groups: Vec<CopyGroup>,
    purge_sets: Vec<PurgeSet>,
}

impl DirectiveBuilder {
    pub fn new(mode: Mode, destination: Option<Destination>) -> Self {
        Self {
            mode,
            destination,
            members: Vec::new(),
            copy_groups: Vec::new(),
            purge_sets: Vec::new(),
        }
    }

    /// Check every record against the mode and destination before anything is expanded.
    pub fn validate_records(&self, records: &[PatternRecord]) -> Result<(), DefinitionError> {
        records.iter().try_for_each(|record| self.validate(record))
    }

    pub fn validate(&self, record: &PatternRecord) -> Result<(), DefinitionError> {
        let problem = match (record.marker, self.mode) {
            (Marker::Copy, Mode::Sync) => {
                Some("copy marker '%' is only valid in archive definitions".to_owned())
            }
            (Marker::Purge, Mode::Archive) => {
                Some("purge marker '!' is only valid in sync definitions".to_owned())
            }
            (Marker::Purge, Mode::Sync) => match &self.destination {
                None => Some("purge requires a destination".to_owned()),
                Some(destination) if !destination.is_local() => Some(format!(
                    "cannot purge non-local destination '{}'",
                    destination.root
                )),
                Some(_) => None,
            },
            _ => None,
        };
        match problem {
            Some(message) => Err(DefinitionError::Configuration {
                location: record.location.clone(),
                message,
            }),
            None => Ok(()),
        }
    }

    pub fn push(&mut self, item: WorkItem) {
        let relative = preserved_part(&item.path, &item.implied_root);
        match (item.marker, item.group_label) {
            (Marker::Copy, Some(label)) => {
                let staged = MemberEntry {
                    source: item.path.clone(),
                    implied_root: item.implied_root.clone(),
                    name: relative.clone(),
                    group: Some(label.clone()),
                    follow: item.follow,
                    is_dir: item.is_dir,
                };
                self.members.push(MemberEntry {
                    name: PathBuf::from(&label).join(&relative),
                    ..staged.clone()
                });
                match self.copy_groups.iter_mut().find(|group| group.label == label) {
                    Some(group) => group.entries.push(staged),
                    None => self.copy_groups.push(CopyGroup {
                        label,
                        entries: vec![staged],
                    }),
                }
            }
            (Marker::Include, _) => {}
            (_, group) => self.members.push(MemberEntry {
                source: item.path,
                implied_root: item.implied_root,
                name: relative,
                group,
                follow: item.follow,
                is_dir: item.is_dir,
            }),
        }
    }

    /// Register a purge pattern: `implied_part` is the pattern text below `implied_root`.
    pub fn add_purge(&mut self, implied_root: PathBuf, implied_part: String) {
        if let Some(set) = self
            .purge_sets
            .iter_mut()
            .find(|set| set.implied_root == implied_root)
        {
            if !set.patterns.contains(&implied_part) {
                set.patterns.push(implied_part);
            }
            return;
        }
        let purge_root = self
            .destination
            .as_ref()
            .map(|destination| PathBuf::from(&destination.root))
            .unwrap_or_default();
        self.purge_sets.push(PurgeSet {
            implied_root,
            purge_root,
            patterns: vec![implied_part],
            kept: BTreeSet::new(),
        });
    }

    pub fn finish(mut self) -> Directives {
        for set in &mut self.purge_sets {
            set.kept = self
                .members
                .iter()
                .filter(|member| member.group.is_none() && member.implied_root == set.implied_root)
                .map(|member| member.name.clone())
                .collect();
        }
        Directives {
            mode: self.mode,
            members: self.members,
            copy_groups: self.copy_groups,
            purge_sets: self.purge_sets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::Location;

    fn record(marker: Marker, label: Option<&str>) -> PatternRecord {
        PatternRecord {
            marker,
            text: "ignored".into(),
            location: Location::new("test.def", 4),
            group_label: label.map(str::to_owned),
        }
    }

    fn item(path: &str, root: &str, marker: Marker, label: Option<&str>) -> WorkItem {
        WorkItem {
            path: path.into(),
            implied_root: root.into(),
            marker,
            group_label: label.map(str::to_owned),
            follow: false,
            is_dir: false,
        }
    }

    #[test]
    fn members_carry_destination_relative_names() {
        let mut builder = DirectiveBuilder::new(Mode::Archive, None);
        builder.push(item("/home/u/2/x/bar", "/home/u/2", Marker::Plain, None));
        builder.push(item("/home/u/3/foo/bar", "/home/u/3/foo", Marker::Plain, None));
        let directives = builder.finish();

        let names: Vec<_> = directives.members.iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, [PathBuf::from("x/bar"), PathBuf::from("bar")]);
        assert!(directives.copy_groups.is_empty());
    }

    #[test]
    fn copy_items_group_by_label_in_first_seen_order() {
        let mut builder = DirectiveBuilder::new(Mode::Archive, None);
        builder.push(item("/home/u/.vimrc", "/home/u", Marker::Copy, Some("configs")));
        builder.push(item("/home/u/.bashrc", "/home/u", Marker::Copy, Some("bash")));
        builder.push(item("/home/u/.gvimrc", "/home/u", Marker::Copy, Some("configs")));
        let directives = builder.finish();

        let labels: Vec<_> = directives
            .copy_groups
            .iter()
            .map(|group| (group.label.as_str(), group.entries.len()))
            .collect();
        assert_eq!(labels, [("configs", 2), ("bash", 1)]);
        assert_eq!(directives.members[1].name, PathBuf::from("bash/.bashrc"));
        assert_eq!(
            directives.copy_groups[0].entries[1].name,
            PathBuf::from(".gvimrc")
        );
    }

    #[test]
    fn purge_rejected_for_remote_destination() {
        let builder = DirectiveBuilder::new(Mode::Sync, Some(Destination::parse("host:/bak")));
        let err = builder
            .validate_records(&[record(Marker::Plain, None), record(Marker::Purge, None)])
            .unwrap_err();
        assert!(matches!(err, DefinitionError::Configuration { .. }));
    }

    #[test]
    fn markers_checked_against_mode() {
        let archive = DirectiveBuilder::new(Mode::Archive, None);
        assert!(archive.validate(&record(Marker::Purge, None)).is_err());
        assert!(archive.validate(&record(Marker::Copy, Some("x"))).is_ok());

        let sync = DirectiveBuilder::new(Mode::Sync, Some(Destination::local("/bak")));
        assert!(sync.validate(&record(Marker::Copy, Some("x"))).is_err());
        assert!(sync.validate(&record(Marker::Purge, None)).is_ok());
    }

    #[test]
    fn purge_sets_collect_kept_names_per_root() {
        let mut builder = DirectiveBuilder::new(Mode::Sync, Some(Destination::local("/bak")));
        builder.add_purge("/home/u".into(), ".config/*.conf".into());
        builder.push(item("/home/u/.config/a.conf", "/home/u", Marker::Purge, None));
        builder.push(item("/home/u/.config/b.conf", "/home/u", Marker::Purge, None));
        builder.push(item("/srv/other", "/srv", Marker::Plain, None));
        builder.add_purge("/home/u".into(), ".config/*.conf".into());
        let directives = builder.finish();

        assert_eq!(directives.purge_sets.len(), 1);
        let set = &directives.purge_sets[0];
        assert_eq!(set.purge_root, PathBuf::from("/bak"));
        assert_eq!(set.patterns, [".config/*.conf"]);
        let kept: Vec<_> = set.kept.iter().cloned().collect();
        assert_eq!(
            kept,
            [
                PathBuf::from(".config/a.conf"),
                PathBuf::from(".config/b.conf")
            ]
        );
        assert_eq!(directives.members.len(), 3);
    }
}
