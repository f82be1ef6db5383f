use std::io::Write;

use clap::CommandFactory;
use followgraph::Error;

use crate::Cli;

fn completion_script(shell: clap_complete::Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let mut out = Vec::new();
    clap_complete::generate(shell, &mut cmd, "followgraph", &mut out);
    out
}

pub(crate) fn handle_completions(shell: clap_complete::Shell) -> Result<(), Error> {
    let out = completion_script(shell);
    std::io::stdout()
        .write_all(&out)
        .map_err(|e| Error::config(format!("cannot write completions: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_script_contains_binary_name() {
        let script = completion_script(clap_complete::Shell::Bash);
        let script = String::from_utf8(script).expect("completion output should be UTF-8");
        assert!(script.contains("followgraph"));
    }

    #[test]
    fn completion_script_lists_subcommands() {
        let script = completion_script(clap_complete::Shell::Zsh);
        let script = String::from_utf8(script).expect("completion output should be UTF-8");
        for name in ["migrate", "fetch", "tag"] {
            assert!(script.contains(name), "missing {name}");
        }
    }
}
