use super::SlashCommand;

#[test]
fn it_is_quit() {
    let inputs = vec!["/q", "/quit", "/exit"];
    for input in inputs {
        let cmd = SlashCommand::parse(input).unwrap();
        assert!(cmd.is_quit());
    }
}

#[test]
fn it_is_help() {
    let inputs = vec!["/h", "/help"];
    for input in inputs {
        let cmd = SlashCommand::parse(input).unwrap();
        assert!(cmd.is_help());
    }
}

#[test]
fn it_is_new_session() {
    let inputs = vec!["/n", "/new"];
    for input in inputs {
        let cmd = SlashCommand::parse(input).unwrap();
        assert!(cmd.is_new_session());
    }
}

#[test]
fn it_is_list_sessions() {
    let inputs = vec!["/ls", "/sessions"];
    for input in inputs {
        let cmd = SlashCommand::parse(input).unwrap();
        assert!(cmd.is_list_sessions());
    }
}

#[test]
fn it_is_open_session_with_args() {
    let cmd = SlashCommand::parse("/open 2").unwrap();
    assert!(cmd.is_open_session());
    assert_eq!(cmd.args, vec!["2".to_string()]);
}

#[test]
fn it_is_rename_session_with_free_text() {
    let cmd = SlashCommand::parse("/rename  Rust   questions ").unwrap();
    assert!(cmd.is_rename_session());
    assert_eq!(cmd.rest(), "Rust   questions");

    let cmd = SlashCommand::parse("/rename\tTabs\tand  spaces").unwrap();
    assert!(cmd.is_rename_session());
    assert_eq!(cmd.rest(), "Tabs\tand  spaces");
}

#[test]
fn it_is_delete_session() {
    let inputs = vec!["/d", "/delete", "/delete 3"];
    for input in inputs {
        let cmd = SlashCommand::parse(input).unwrap();
        assert!(cmd.is_delete_session());
    }
}

#[test]
fn it_is_clear_sessions() {
    let cmd = SlashCommand::parse("/clear").unwrap();
    assert!(cmd.is_clear_sessions());
}

#[test]
fn it_is_attach() {
    let cmd = SlashCommand::parse("/attach ./notes.txt").unwrap();
    assert!(cmd.is_attach());
    assert_eq!(cmd.rest(), "./notes.txt");

    let cmd = SlashCommand::parse("/attach ./Meeting  Notes/q1 plan.txt").unwrap();
    assert_eq!(cmd.rest(), "./Meeting  Notes/q1 plan.txt");
}

#[test]
fn it_is_detach() {
    let cmd = SlashCommand::parse("/detach").unwrap();
    assert!(cmd.is_detach());
}

#[test]
fn it_is_not_a_command() {
    assert!(SlashCommand::parse("hello world").is_none());
    assert!(SlashCommand::parse("/unknown").is_none());
    assert!(SlashCommand::parse("   ").is_none());
}
