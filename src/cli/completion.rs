//! Shell completion generation for cwlogs-export
//!
//! Completion scripts for bash, zsh and fish are generated from the clap
//! command definition. Log group names get dynamic completion through
//! `aws logs describe-log-groups` when the AWS CLI is installed.

use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::CliArgs;
use crate::error::{ConfigError, Result};

const BIN_NAME: &str = "cwlogs-export";

/// Generate shell completion script
///
/// # Arguments
/// * `shell_name` - Shell type (bash, zsh, fish)
///
/// # Returns
/// * `Result<()>` - Success or error
pub fn generate_completion(shell_name: &str) -> Result<()> {
    let shell = parse_shell(shell_name)?;
    print!("{}", render_completion(shell));
    Ok(())
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        _ => Err(ConfigError::Generic(format!(
            "Unsupported shell: {}. Supported shells: bash, zsh, fish",
            shell_name
        ))
        .into()),
    }
}

/// Render the full completion script for `shell`
fn render_completion(shell: Shell) -> String {
    let mut cmd = CliArgs::command();
    let mut buffer = Vec::new();
    generate(shell, &mut cmd, BIN_NAME, &mut buffer);

    let basic = String::from_utf8_lossy(&buffer);
    let extra = match shell {
        Shell::Bash => BASH_LOG_GROUPS,
        Shell::Zsh => ZSH_LOG_GROUPS,
        _ => FISH_LOG_GROUPS,
    };
    format!("{}\n{}", basic, extra)
}

const BASH_LOG_GROUPS: &str = r#"
# Complete --log-group from the AWS CLI when available
_cwlogs_export_log_groups() {
    aws logs describe-log-groups --query 'logGroups[].logGroupName' --output text 2>/dev/null
}

_cwlogs_export_enhanced() {
    local cur prev words cword
    _init_completion || return

    if [[ "$prev" == "--log-group" ]]; then
        COMPREPLY=($(compgen -W "$(_cwlogs_export_log_groups)" -- "$cur"))
        return 0
    fi

    _cwlogs-export "$@"
}

complete -F _cwlogs_export_enhanced cwlogs-export
"#;

const ZSH_LOG_GROUPS: &str = r#"
# Complete --log-group from the AWS CLI when available
_cwlogs_export_log_groups() {
    local -a groups
    groups=(${(f)"$(aws logs describe-log-groups --query 'logGroups[].logGroupName' --output text 2>/dev/null | tr '\t' '\n')"})
    _describe 'log groups' groups
}

_cwlogs_export_enhanced() {
    if [[ ${words[CURRENT-1]} == "--log-group" ]]; then
        _cwlogs_export_log_groups
        return 0
    fi
    _cwlogs-export "$@"
}

compdef _cwlogs_export_enhanced cwlogs-export
"#;

const FISH_LOG_GROUPS: &str = r#"
# Complete --log-group from the AWS CLI when available
function __cwlogs_export_log_groups
    aws logs describe-log-groups --query 'logGroups[].logGroupName' --output text 2>/dev/null | string split \t
end

complete -c cwlogs-export -l log-group -f -a "(__cwlogs_export_log_groups)" -d "Log group name"
"#;
