use std::path::Path;
use std::sync::Arc;

use backdef::app::plan::{PlanOptions, Planner};
use backdef::app::render::listing;
use backdef::domain::model::{Destination, Mode};
use backdef::infra::config::Config;
use backdef::infra::env::StaticEnvironment;
use insta::assert_snapshot;

fn planner(mode: Mode, destination: Option<Destination>) -> Planner {
    let mut options = PlanOptions::from_config(&Config::default(), mode);
    options.destination = destination;
    let env = StaticEnvironment::new().with_home("/srv/fixture/home");
    Planner::new(Arc::new(env), options, "/work")
}

#[test]
fn archive_listing_renders() {
    let text = "\
/srv/fixture/notes.txt
%~/.vimrc
# %shell
%~/./.bashrc
%~/.profile
";
    let plan = planner(Mode::Archive, None)
        .plan_str(Path::new("configs.def"), text)
        .expect("plan builds");

    assert_snapshot!(listing(&plan).trim_end(), @r"
    # configs.def (archive)
    archive /work/configs.tar
    [___] notes.txt <- /srv/fixture/notes.txt
    [_C_] configs/.vimrc <- /srv/fixture/home/.vimrc
    [_C_] shell/.bashrc <- /srv/fixture/home/.bashrc
    [_C_] shell/.profile <- /srv/fixture/home/.profile
    stage configs/: .vimrc
    stage shell/: .bashrc .profile
    ");
}

#[test]
fn sync_listing_renders() {
    let text = "\
!/srv/fixture/./conf/app.conf
/srv/fixture/./conf/extra.conf
";
    let plan = planner(Mode::Sync, Some(Destination::local("/bak")))
        .plan_str(Path::new("sync.def"), text)
        .expect("plan builds");

    assert_snapshot!(listing(&plan).trim_end(), @r"
    # sync.def (sync)
    [___] conf/app.conf <- /srv/fixture/conf/app.conf
    [___] conf/extra.conf <- /srv/fixture/conf/extra.conf
    purge conf/app.conf under /bak (keeping 2)
    ");
}
