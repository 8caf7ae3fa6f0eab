use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use tempfile::TempDir;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// A provisioner that logs every invocation and answers creates with a handle named after the
/// resource. Creating the node `fail-me` exits non-zero.
const PROVISIONER_SCRIPT: &str = r#"
echo "$*" >> "$(dirname "$0")/calls.log"
case "$1 $2" in
  "network create") echo "net-$6" ;;
  "node create")
    if [ "$6" = "fail-me" ]; then
      echo "no capacity for $6" >&2
      exit 1
    fi
    echo "node-$6"
    ;;
esac
"#;

const BROKEN_TEMPLATE: &str = r#"
networks:
  - name: lan
nodes:
  - name: fail-me
    networks: [lan]
"#;

//--------------------------------------------------------------------------------------------------
// Function: Helper
//--------------------------------------------------------------------------------------------------

/// Runs the topobox binary against the given home directory.
fn topobox(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_topobox"))
        .arg("--home")
        .arg(home)
        .args(args)
        .env_remove("TOPOBOX_HOME")
        .env_remove("TOPOBOX_PROVISIONER")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute topobox")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Creates a home directory with `topobox setup` already run.
fn setup_home() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let home = temp_dir.path().join("home");

    let output = topobox(&home, &["setup"]);
    assert!(output.status.success(), "setup failed: {}", stderr(&output));

    (temp_dir, home)
}

/// Points the home's settings at the scripted provisioner.
fn install_provisioner(home: &Path) {
    let script = home.join("provisioner.sh");
    fs::write(&script, PROVISIONER_SCRIPT).unwrap();
    fs::write(
        home.join("settings.yaml"),
        format!("provisioner: [sh, {}]\n", script.display()),
    )
    .unwrap();
}

/// Drops a placeholder disk image into the home's image store.
fn install_image(home: &Path, file_name: &str) {
    fs::write(home.join("images").join(file_name), vec![0u8; 2048]).unwrap();
}

fn provisioner_calls(home: &Path) -> Vec<String> {
    fs::read_to_string(home.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test]
fn integration_test_setup_creates_home_and_starters() {
    let (_temp_dir, home) = setup_home();

    assert!(home.join("sandboxes").is_dir(), "sandboxes should exist");
    assert!(home.join("templates").is_dir(), "templates should exist");
    assert!(home.join("locks").is_dir(), "locks should exist");
    assert!(home.join("images").is_dir(), "images should exist");
    assert!(home.join("templates/all-in-one.yaml").is_file());
    assert!(home.join("templates/multi-one-control.yaml").is_file());

    // A second run keeps what is there and installs nothing new.
    let output = topobox(&home, &["setup"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("initialized topobox home"));
    assert!(!stdout(&output).contains("installed template"));
}

#[test]
fn integration_test_template_list_and_show() {
    let (_temp_dir, home) = setup_home();

    let output = topobox(&home, &["template", "list"]);
    assert!(output.status.success());
    let listing = stdout(&output);
    assert!(listing.starts_with("NAME"));
    assert!(listing.contains("all-in-one"));
    assert!(listing.contains("multi-one-control"));

    let output = topobox(&home, &["template", "show", "multi-one-control"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("compute2"));

    let output = topobox(&home, &["template", "show", "nope"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no template with name 'nope' found"));
}

#[test]
fn integration_test_sandbox_list_on_fresh_home() {
    let (_temp_dir, home) = setup_home();

    let output = topobox(&home, &["sandbox", "list"]);
    assert!(output.status.success());
    let listing = stdout(&output);
    assert_eq!(listing.lines().count(), 1, "only the header: {listing}");
    assert!(listing.contains("TEMPLATE"));
}

#[test]
fn integration_test_sandbox_show_missing_fails() {
    let (_temp_dir, home) = setup_home();

    let output = topobox(&home, &["sandbox", "show", "ghost"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("'ghost' does not exist"));
}

#[test]
fn integration_test_missing_home_fails() {
    let temp_dir = TempDir::new().unwrap();
    let home = temp_dir.path().join("absent");

    let output = topobox(&home, &["sandbox", "list"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("topobox setup"));
    assert!(!home.exists());
}

#[test]
fn integration_test_create_without_provisioner_fails() {
    let (_temp_dir, home) = setup_home();

    let output = topobox(&home, &["sandbox", "create", "sb1", "-t", "all-in-one"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no provisioner configured"));
    assert!(!home.join("sandboxes/sb1.json").exists());
}

#[test]
fn integration_test_sandbox_lifecycle_with_provisioner() {
    let (_temp_dir, home) = setup_home();
    install_provisioner(&home);
    install_image(&home, "ubuntu.qcow2");

    let output = topobox(&home, &["sandbox", "create", "sb1", "-t", "all-in-one"]);
    assert!(output.status.success(), "create failed: {}", stderr(&output));
    assert!(stdout(&output).contains("active"));
    assert!(home.join("sandboxes/sb1.json").is_file());

    let output = topobox(&home, &["sandbox", "list", "--status", "active"]);
    assert!(stdout(&output).contains("sb1"));

    let output = topobox(&home, &["sandbox", "stop", "sb1"]);
    assert!(output.status.success(), "stop failed: {}", stderr(&output));
    assert!(stdout(&output).contains("stopped"));

    let output = topobox(&home, &["sandbox", "delete", "sb1"]);
    assert!(output.status.success(), "delete failed: {}", stderr(&output));
    assert!(!home.join("sandboxes/sb1.json").exists());
    assert!(!home.join("locks/sb1.lock").exists());

    assert_eq!(
        provisioner_calls(&home),
        vec![
            "network create --sandbox sb1 --name mgmt --cidr 10.10.0.0/28",
            "network create --sandbox sb1 --name private --cidr 10.10.0.16/28",
            "network create --sandbox sb1 --name public --cidr 10.10.0.32/28",
            "node create --sandbox sb1 --name aio --cpus 2 --ram-mib 1024 --image ubuntu \
             --service compute --service controller \
             --network net-mgmt --network net-private --network net-public",
            "node stop --handle node-aio",
            "node delete --handle node-aio",
            "network delete --handle net-public",
            "network delete --handle net-private",
            "network delete --handle net-mgmt",
        ]
    );
}

#[test]
fn integration_test_failed_create_is_kept_and_force_deleted() {
    let (_temp_dir, home) = setup_home();
    install_provisioner(&home);
    fs::write(home.join("templates/broken.yaml"), BROKEN_TEMPLATE).unwrap();

    let output = topobox(&home, &["sandbox", "create", "sb1", "-t", "broken"]);
    assert!(!output.status.success());
    let message = stderr(&output);
    assert!(message.contains("sandbox 'sb1'"));
    assert!(message.contains("node 'fail-me'"));
    assert!(message.contains("no capacity for fail-me"));

    let output = topobox(&home, &["sandbox", "show", "sb1"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("error"));

    let output = topobox(&home, &["sandbox", "create", "sb1", "-t", "broken"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("already exists"));

    let output = topobox(&home, &["sandbox", "delete", "sb1", "--force"]);
    assert!(output.status.success(), "delete failed: {}", stderr(&output));
    assert!(!home.join("sandboxes/sb1.json").exists());
}

#[test]
fn integration_test_image_list() {
    let (_temp_dir, home) = setup_home();

    let output = topobox(&home, &["image", "list"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).lines().count(), 1);

    install_image(&home, "ubuntu.qcow2");
    install_image(&home, "alpine.raw");

    let output = topobox(&home, &["image", "list"]);
    assert!(output.status.success());
    let listing = stdout(&output);
    let rows: Vec<_> = listing.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("alpine"));
    assert!(rows[0].contains("raw"));
    assert!(rows[0].contains("2.0 KiB"));
    assert!(rows[1].starts_with("ubuntu"));
    assert!(rows[1].contains("qcow2"));
}

#[test]
fn integration_test_create_with_missing_image_fails() {
    let (_temp_dir, home) = setup_home();
    install_provisioner(&home);

    let output = topobox(&home, &["sandbox", "create", "sb1", "-t", "all-in-one"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("image 'ubuntu'"));
    assert!(!home.join("sandboxes/sb1.json").exists());
    assert!(!home.join("locks/sb1.lock").exists());
    assert!(provisioner_calls(&home).is_empty());
}

#[test]
fn integration_test_force_delete_without_provisioner_removes_corrupted_record() {
    let (_temp_dir, home) = setup_home();
    let record = home.join("sandboxes/bad.json");
    fs::write(&record, "{ not json").unwrap();

    let output = topobox(&home, &["sandbox", "delete", "bad"]);
    assert!(!output.status.success());
    assert!(record.exists());

    let output = topobox(&home, &["sandbox", "delete", "bad", "--force"]);
    assert!(output.status.success(), "delete failed: {}", stderr(&output));
    assert!(stdout(&output).contains("deleted"));
    assert!(!record.exists());
    assert!(!home.join("locks/bad.lock").exists());

    // Nothing left to delete is still a success.
    let output = topobox(&home, &["sandbox", "delete", "bad", "--force"]);
    assert!(output.status.success());
}

#[test]
fn integration_test_force_delete_with_unreadable_settings() {
    let (_temp_dir, home) = setup_home();
    install_provisioner(&home);
    fs::write(home.join("templates/broken.yaml"), BROKEN_TEMPLATE).unwrap();

    let output = topobox(&home, &["sandbox", "create", "sb1", "-t", "broken"]);
    assert!(!output.status.success());
    assert!(home.join("sandboxes/sb1.json").exists());

    fs::write(home.join("settings.yaml"), "provisioner: [unterminated").unwrap();
    let output = topobox(&home, &["sandbox", "delete", "sb1", "-f"]);
    assert!(output.status.success(), "delete failed: {}", stderr(&output));
    assert!(!home.join("sandboxes/sb1.json").exists());
}
