use super::*;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

static TEST_MUTEX: Mutex<()> = Mutex::new(());
static TEMP_DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn with_isolated_home<F>(func: F)
where
    F: FnOnce(&Path),
{
    let _guard = TEST_MUTEX.lock().unwrap();
    let temp_home = create_unique_home();
    let snapshot = EnvSnapshot::capture();
    set_home_env(&temp_home);

    func(&temp_home);

    snapshot.restore();
    let _ = fs::remove_dir_all(&temp_home);
}

fn create_unique_home() -> PathBuf {
    let id = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("memey-cli-test-home-{}-{}", std::process::id(), id));
    fs::create_dir_all(&path).expect("create unique test home");
    path
}

fn set_home_env(path: &Path) {
    set_env("HOME", path.as_os_str());
    set_env("USERPROFILE", path.as_os_str());
}

struct EnvSnapshot {
    home: Option<OsString>,
    userprofile: Option<OsString>,
}

impl EnvSnapshot {
    fn capture() -> Self {
        Self {
            home: std::env::var_os("HOME"),
            userprofile: std::env::var_os("USERPROFILE"),
        }
    }

    fn restore(self) {
        if let Some(value) = self.home {
            set_env("HOME", &value);
        } else {
            remove_env("HOME");
        }

        if let Some(value) = self.userprofile {
            set_env("USERPROFILE", &value);
        } else {
            remove_env("USERPROFILE");
        }
    }
}

fn set_env(key: &str, value: &OsStr) {
    // SAFETY: keys and values stem from ASCII literals or formatted identifiers
    // without interior null bytes, maintaining environment invariants.
    unsafe { std::env::set_var(key, value) };
}

fn remove_env(key: &str) {
    unsafe { std::env::remove_var(key) };
}

fn sample_store() -> TemplateStore {
    TemplateStore::from_templates(vec![Template {
        id: 1,
        name: "Y U No".to_string(),
        url: "https://example.com/y-u-no.jpg".to_string(),
    }])
}

fn create_args(phrase: Option<&str>, search: Option<&str>, top: Option<&str>, bottom: Option<&str>) -> CreateArgs {
    CreateArgs {
        phrase: phrase.map(str::to_string),
        search: search.map(str::to_string),
        top: top.map(str::to_string),
        bottom: bottom.map(str::to_string),
        ..CreateArgs::default()
    }
}

#[test]
fn cli_parses_flags_and_subcommands() {
    let cli = Cli::parse_from(["memey", "-s", "y u no", "-t", "WHY", "-b", "JUST WHY"]);
    assert!(cli.command.is_none());
    assert_eq!(cli.create.search.as_deref(), Some("y u no"));
    assert_eq!(cli.create.top.as_deref(), Some("WHY"));
    assert_eq!(cli.create.bottom.as_deref(), Some("JUST WHY"));

    let cli = Cli::parse_from(["memey", "y u no work"]);
    assert!(cli.command.is_none());
    assert_eq!(cli.create.phrase.as_deref(), Some("y u no work"));

    let cli = Cli::parse_from(["memey", "update"]);
    assert!(matches!(cli.command, Some(Command::Update)));

    let cli = Cli::parse_from(["memey", "stats", "-d"]);
    assert!(matches!(cli.command, Some(Command::Stats)));
    assert!(cli.debug);
}

#[test]
fn input_presence_covers_the_known_flag_set() {
    assert!(!has_input(&create_args(None, None, None, None)));
    assert!(has_input(&create_args(Some("y u no work"), None, None, None)));
    assert!(has_input(&create_args(None, Some("fry"), None, None)));
    assert!(has_input(&create_args(None, None, Some("top"), None)));
    assert!(has_input(&create_args(None, None, None, Some("bottom"))));
}

#[test]
fn query_with_caption_text_plans_a_simple_caption() {
    let store = sample_store();
    let table = ExpressionTable::builtin();
    let args = create_args(None, Some("y u no"), Some("WHY"), Some("JUST WHY"));

    let plan = plan_create(&args, &store, &table).expect("plan succeeds");
    match plan {
        CreatePlan::Caption(job) => {
            assert_eq!(
                job,
                CaptionJob {
                    template_id: 1,
                    top: Some("WHY".to_string()),
                    bottom: Some("JUST WHY".to_string()),
                    mode: CaptionMode::Simple,
                }
            );
        }
        other => panic!("expected a caption job, got {other:?}"),
    }
}

#[test]
fn shorthand_phrase_plans_without_explicit_query() {
    let store = sample_store();
    let table = ExpressionTable::builtin();
    let args = create_args(Some("y u no work"), None, None, None);

    let plan = plan_create(&args, &store, &table).expect("plan succeeds");
    match plan {
        CreatePlan::Caption(job) => {
            assert_eq!(job.template_id, 61527);
            assert_eq!(job.top.as_deref(), Some("y u no"));
            assert_eq!(job.bottom.as_deref(), Some("work"));
            assert_eq!(job.mode, CaptionMode::Simple);
        }
        other => panic!("expected a caption job, got {other:?}"),
    }
}

#[test]
fn query_without_caption_text_plans_a_listing() {
    let store = sample_store();
    let table = ExpressionTable::builtin();
    let args = create_args(None, Some("y u no"), None, None);

    let plan = plan_create(&args, &store, &table).expect("plan succeeds");
    match plan {
        CreatePlan::List(lines) => {
            assert_eq!(lines, vec!["Y U No - https://example.com/y-u-no.jpg".to_string()]);
        }
        other => panic!("expected a listing, got {other:?}"),
    }
}

#[test]
fn alternating_case_flag_forces_boxes_mode() {
    let store = sample_store();
    let table = ExpressionTable::builtin();
    let mut args = create_args(None, Some("y u no"), Some("THIS IS FINE"), None);
    args.alternating_case = true;

    let plan = plan_create(&args, &store, &table).expect("plan succeeds");
    match plan {
        CreatePlan::Caption(job) => {
            assert_eq!(job.mode, CaptionMode::Boxes);
            assert_eq!(job.top.as_deref(), Some("ThIs iS FiNe"));
            assert!(job.bottom.is_none());
        }
        other => panic!("expected a caption job, got {other:?}"),
    }
}

#[test]
fn unmatched_query_and_phrase_report_distinct_messages() {
    let store = sample_store();
    let table = ExpressionTable::builtin();

    let query_miss = plan_create(&create_args(None, Some("doge"), Some("wow"), None), &store, &table)
        .expect_err("query should miss");
    assert!(matches!(query_miss, CliError::NoQueryMatch));
    assert_eq!(query_miss.to_string(), "No memes found.");

    let phrase_miss = plan_create(
        &create_args(Some("completely unrelated"), None, None, None),
        &store,
        &table,
    )
    .expect_err("phrase should miss");
    assert!(matches!(phrase_miss, CliError::NoPhraseMatch));
    assert_eq!(phrase_miss.to_string(), "Meme not found.");
}

#[test]
fn create_refuses_without_credentials() {
    with_isolated_home(|_| {
        let error = run_create(&create_args(Some("y u no work"), None, None, None))
            .expect_err("create should refuse");
        assert!(matches!(error, CliError::NotLoggedIn));
        assert!(error.to_string().contains("memey login"));
    });
}

#[test]
fn create_without_input_is_rejected_after_login() {
    with_isolated_home(|_| {
        Credentials {
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
        }
        .save()
        .expect("save credentials");

        let error = run_create(&create_args(None, None, None, None)).expect_err("no input given");
        assert!(matches!(error, CliError::NoInput));
    });
}
