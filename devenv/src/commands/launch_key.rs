use anyhow::Result;
use devenv_config::DevenvConfig;
use devenv_lsp::strategy_for;
use serde::Serialize;

#[derive(Serialize)]
struct LaunchKeyOutput<'a> {
    policy: String,
    launch_key: String,
    root_uri: String,
    file: &'a str,
}

pub fn handle_launch_key(config: &DevenvConfig, file: &str, language: Option<&str>) -> Result<()> {
    let policy = config.launch_policy(language);
    let strategy = strategy_for(policy, &config.workspace_root);

    let output = LaunchKeyOutput {
        policy: policy.to_string(),
        launch_key: strategy.launch_key(file),
        root_uri: strategy.root_uri(file)?,
        file,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
