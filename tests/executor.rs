mod common;

use std::time::Duration;

use commander::error::DeviceErrorKind;
use commander::executor::{ExecOptions, execute_commands};
use commander::permission::PermissionLevel;

use common::{Call, Failure, MockTransport, Mode, Script, commands, device};

#[tokio::test]
async fn enable_from_config_only_exits_config_mode() {
    let transport = MockTransport::new([("r1", Script::in_mode(Mode::Config))]);

    let output = execute_commands(
        &transport,
        &device("r1"),
        &commands(&["show version"]),
        PermissionLevel::Enable,
        ExecOptions::default(),
    )
    .await
    .expect("execute");

    assert_eq!(transport.mode_changes("r1"), vec![Call::ExitConfigMode]);
    assert_eq!(output, "r1#show version\noutput of show version\n");
}

#[tokio::test]
async fn configure_from_user_enables_then_sends_one_batch() {
    let transport = MockTransport::new([("r1", Script::in_mode(Mode::User))]);
    let cmds = commands(&["interface eth0", "no shutdown"]);

    let output = execute_commands(
        &transport,
        &device("r1"),
        &cmds,
        PermissionLevel::Configure,
        ExecOptions::default(),
    )
    .await
    .expect("execute");

    assert_eq!(
        transport.calls("r1"),
        vec![
            Call::Open,
            Call::Enable,
            Call::ConfigMode,
            Call::FindPrompt,
            Call::SendConfigSet(cmds.clone()),
            Call::Close,
        ]
    );
    assert_eq!(
        output,
        "r1(config)#r1(config)#interface eth0\nr1(config)#no shutdown\n"
    );
}

#[tokio::test]
async fn user_level_sends_each_command_after_a_prompt() {
    let transport = MockTransport::new([("r1", Script::in_mode(Mode::User))]);

    let output = execute_commands(
        &transport,
        &device("r1"),
        &commands(&["show clock", "show users", "show ip route"]),
        PermissionLevel::User,
        ExecOptions::default(),
    )
    .await
    .expect("execute");

    assert_eq!(
        transport.calls("r1"),
        vec![
            Call::Open,
            Call::FindPrompt,
            Call::SendCommand("show clock".to_string()),
            Call::FindPrompt,
            Call::SendCommand("show users".to_string()),
            Call::FindPrompt,
            Call::SendCommand("show ip route".to_string()),
            Call::Close,
        ]
    );
    assert_eq!(
        output,
        "r1>show clock\noutput of show clock\n\
         r1>show users\noutput of show users\n\
         r1>show ip route\noutput of show ip route\n"
    );
}

#[tokio::test]
async fn already_at_target_level_changes_no_mode() {
    for (mode, level) in [
        (Mode::User, PermissionLevel::User),
        (Mode::Enable, PermissionLevel::Enable),
        (Mode::Config, PermissionLevel::Configure),
    ] {
        let transport = MockTransport::new([("r1", Script::in_mode(mode))]);
        execute_commands(
            &transport,
            &device("r1"),
            &commands(&["x"]),
            level,
            ExecOptions::default(),
        )
        .await
        .expect("execute");
        assert!(transport.mode_changes("r1").is_empty(), "{mode:?} -> {level}");
    }
}

#[tokio::test]
async fn user_from_config_fully_de_escalates() {
    let transport = MockTransport::new([("r1", Script::in_mode(Mode::Config))]);

    let output = execute_commands(
        &transport,
        &device("r1"),
        &commands(&["show clock"]),
        PermissionLevel::User,
        ExecOptions::default(),
    )
    .await
    .expect("execute");

    assert_eq!(
        transport.mode_changes("r1"),
        vec![Call::ExitConfigMode, Call::ExitEnable]
    );
    assert!(output.starts_with("r1>"));
}

#[tokio::test]
async fn zero_commands_only_connects() {
    let transport = MockTransport::new([("r1", Script::in_mode(Mode::User))]);

    let output = execute_commands(
        &transport,
        &device("r1"),
        &[],
        PermissionLevel::User,
        ExecOptions::default(),
    )
    .await
    .expect("execute");

    assert_eq!(output, "");
    assert_eq!(transport.calls("r1"), vec![Call::Open, Call::Close]);
}

#[tokio::test]
async fn session_is_closed_when_a_command_fails() {
    let transport = MockTransport::new([(
        "r1",
        Script {
            command_failure: Some(Failure::Other),
            ..Script::default()
        },
    )]);

    let err = execute_commands(
        &transport,
        &device("r1"),
        &commands(&["show clock"]),
        PermissionLevel::User,
        ExecOptions::default(),
    )
    .await
    .expect_err("command failure");

    assert_eq!(err.kind(), DeviceErrorKind::Unclassified);
    assert_eq!(transport.calls("r1").last(), Some(&Call::Close));
    assert_eq!(transport.closed(), 1);
}

#[tokio::test]
async fn failed_connect_opens_nothing_to_close() {
    let transport = MockTransport::new([("r1", Script::failing(Failure::Authentication))]);

    let err = execute_commands(
        &transport,
        &device("r1"),
        &commands(&["show clock"]),
        PermissionLevel::User,
        ExecOptions::default(),
    )
    .await
    .expect_err("auth failure");

    assert_eq!(err.kind(), DeviceErrorKind::Authentication);
    assert_eq!(transport.calls("r1"), vec![Call::Open]);
}

#[tokio::test(start_paused = true)]
async fn session_timeout_bounds_a_hung_device_and_still_closes() {
    let transport = MockTransport::new([("r1", Script::hanging(Duration::from_secs(3600)))]);
    let started = tokio::time::Instant::now();

    let err = execute_commands(
        &transport,
        &device("r1"),
        &commands(&["show tech-support"]),
        PermissionLevel::User,
        ExecOptions {
            session_timeout: Some(Duration::from_secs(5)),
        },
    )
    .await
    .expect_err("timeout");

    assert_eq!(err.kind(), DeviceErrorKind::Connection);
    assert!(started.elapsed() < Duration::from_secs(6));
    assert_eq!(transport.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_execution_still_releases_the_session() {
    let transport = MockTransport::new([("r1", Script::hanging(Duration::from_secs(3600)))]);
    let device = device("r1");
    let cmds = commands(&["show tech-support"]);

    let run = execute_commands(
        &transport,
        &device,
        &cmds,
        PermissionLevel::User,
        ExecOptions::default(),
    );
    let abandoned = tokio::time::timeout(Duration::from_secs(5), run).await;

    assert!(abandoned.is_err());
    assert_eq!(transport.opened(), 1);
    assert_eq!(transport.closed(), 0);
    assert_eq!(transport.dropped(), 1);
}

#[tokio::test]
async fn transport_receives_the_device_parameters() {
    let transport = MockTransport::default();
    let original = device("r1")
        .with_parameter("port", "2222")
        .with_parameter("secret", "enable-me");

    execute_commands(
        &transport,
        &original,
        &[],
        PermissionLevel::User,
        ExecOptions::default(),
    )
    .await
    .expect("execute");

    let params = transport.params();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].port(), 2222);
    assert_eq!(params[0].secret(), Some("enable-me"));
    assert_eq!(params[0].clone().into_device("r1"), original);
}
