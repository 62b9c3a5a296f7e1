use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use backdef::app::plan::{Plan, PlanOptions, Planner};
use backdef::domain::errors::DefinitionError;
use backdef::domain::model::{Destination, Mode};
use backdef::infra::config::Config;
use backdef::infra::env::StaticEnvironment;

fn touch(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, b"data")?;
    Ok(())
}

fn planner(root: &Path, mode: Mode, destination: Option<Destination>) -> Planner {
    let mut options = PlanOptions::from_config(&Config::default(), mode);
    options.destination = destination;
    let env = StaticEnvironment::new()
        .with_home(root.join("home"))
        .with_var("XDG_DATA_HOME", root.join("home/.local/share").display().to_string());
    Planner::new(Arc::new(env), options, root)
}

fn member_names(plan: &Plan) -> Vec<String> {
    plan.directives
        .members
        .iter()
        .map(|member| member.name.display().to_string())
        .collect()
}

#[test]
fn included_lines_are_spliced_into_the_label_fold() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let root = temp.path();
    touch(&root.join("home/.vimrc"))?;
    touch(&root.join("home/.bashrc"))?;
    touch(&root.join("home/.config/uzbl/config"))?;
    touch(&root.join("home/.local/share/uzbl/scripts/load.js"))?;
    touch(&root.join("home/.local/share/uzbl/scripts/style.css"))?;

    fs::create_dir_all(root.join("defs/parts"))?;
    fs::write(root.join("defs/parts/b.def"), "%~/.config/uzbl/config\n")?;
    fs::write(root.join("defs/parts/a.def"), "# %bash config\n%~/.bashrc\n")?;
    fs::write(
        root.join("defs/configs.def"),
        concat!(
            "# dotfiles\n",
            "%~/.vimrc\n",
            "\n",
            "@parts/*.def\n",
            "# %uzbl\n",
            "%$XDG_DATA_HOME/uzbl/scripts/\n",
        ),
    )?;

    let plan = planner(root, Mode::Archive, None).plan_file(Path::new("defs/configs.def"))?;

    assert_eq!(
        member_names(&plan),
        [
            "configs/.vimrc",
            "bash/.bashrc",
            "bash/config",
            "uzbl/scripts/load.js",
            "uzbl/scripts/style.css",
        ]
    );
    let groups: Vec<_> = plan
        .directives
        .copy_groups
        .iter()
        .map(|group| group.label.as_str())
        .collect();
    assert_eq!(groups, ["configs", "bash", "uzbl"]);
    Ok(())
}

#[test]
fn every_expansion_shares_the_pattern_implied_root() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let root = temp.path();
    for dir in ["a", "b", "c"] {
        touch(&root.join(format!("srv/{dir}/log/current")))?;
    }

    let plan = planner(root, Mode::Archive, None)
        .plan_str(Path::new("logs.def"), "srv/*/log/current\n")?;

    assert_eq!(
        member_names(&plan),
        ["a/log/current", "b/log/current", "c/log/current"]
    );
    for member in &plan.directives.members {
        assert_eq!(member.implied_root, root.join("srv"));
        assert!(member.source.starts_with(&member.implied_root));
    }
    Ok(())
}

#[test]
fn sync_plan_collects_purge_sets() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let root = temp.path();
    touch(&root.join("home/notes/a.txt"))?;
    touch(&root.join("home/notes/b.txt"))?;
    touch(&root.join("home/todo"))?;

    let destination = Destination::parse(&root.join("backup").display().to_string());
    let plan = planner(root, Mode::Sync, Some(destination)).plan_str(
        Path::new("notes.def"),
        "!~/./notes/*.txt\n~/todo\n",
    )?;

    assert_eq!(member_names(&plan), ["notes/a.txt", "notes/b.txt", "todo"]);
    assert_eq!(plan.directives.purge_sets.len(), 1);
    let set = &plan.directives.purge_sets[0];
    assert_eq!(set.purge_root, root.join("backup"));
    assert_eq!(set.patterns, ["notes/*.txt"]);
    let kept: Vec<PathBuf> = set.kept.iter().cloned().collect();
    assert_eq!(
        kept,
        [
            PathBuf::from("notes/a.txt"),
            PathBuf::from("notes/b.txt"),
            PathBuf::from("todo"),
        ]
    );
    Ok(())
}

#[test]
fn errors_carry_file_and_line() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let root = temp.path();
    fs::write(root.join("loop.def"), "/etc/hosts\n@loop.def\n")?;
    fs::write(root.join("remote.def"), "# header\n!/etc/*.conf\n")?;
    fs::write(root.join("ambiguous.def"), "/etc/hosts\n\n/srv/*/./logs\n")?;

    let archive = planner(root, Mode::Archive, None);
    let err = archive.plan_file(Path::new("loop.def")).unwrap_err();
    assert!(matches!(err, DefinitionError::CyclicInclusion { .. }));
    assert_eq!(err.location().line, 2);

    let sync = planner(root, Mode::Sync, Some(Destination::parse("backup@host:/srv")));
    let err = sync.plan_file(Path::new("remote.def")).unwrap_err();
    assert!(matches!(err, DefinitionError::Configuration { .. }));
    assert!(err.to_string().starts_with("remote.def:2:"));

    let err = archive.plan_file(Path::new("ambiguous.def")).unwrap_err();
    assert!(matches!(err, DefinitionError::Configuration { .. }));
    assert_eq!(err.location().file, PathBuf::from("ambiguous.def"));
    assert_eq!(err.location().line, 3);
    Ok(())
}
