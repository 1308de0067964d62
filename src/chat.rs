//! Interactive chat front end.
//!
//! Slash commands hit the registry and store directly; anything else
//! is routed through the agent layer. Ctrl-c sets a shutdown flag that
//! the loop checks before each prompt, so teardown always runs.

use std::io::Write as _;

use anyhow::{bail, Context as _};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use courier_agents::{AgentRouter, Roster, SequentialAgent, StepContext};
use courier_llm::{CompletionRequest, Message, MultiLlm};
use courier_mcp::{BackendSet, CapabilityRegistry, Tool};
use courier_memory::{MemoryCategory, MemoryStore};

use crate::config::AppConfig;

/// Run the interactive chat session.
pub async fn run(config: AppConfig, user: &str) -> anyhow::Result<()> {
    let mut session = ChatSession::start(config, user).await?;
    session.run_loop().await;
    session.registry.disconnect_all();
    println!("Chat session ended.");
    Ok(())
}

/// One-shot catalog listing for `courier tools`.
pub async fn list_tools(config: AppConfig) -> anyhow::Result<()> {
    let mut registry = build_registry(&config).await?;
    let tools = registry.list_all_tools();

    if tools.is_empty() {
        println!("No tools available.");
    } else {
        println!("Available Tools ({} total):", tools.len());
        for (key, server_id, tool) in &tools {
            println!("{}", "-".repeat(40));
            print!("{}", render_tool(key, server_id, tool));
        }
    }

    registry.disconnect_all();
    Ok(())
}

pub(crate) async fn build_registry(config: &AppConfig) -> anyhow::Result<CapabilityRegistry> {
    let backends = BackendSet::from_path(&config.servers_config)
        .with_context(|| format!("loading {}", config.servers_config.display()))?;
    if backends.is_empty() {
        bail!(
            "no servers configured in {}",
            config.servers_config.display()
        );
    }

    let mut registry = CapabilityRegistry::new(backends);
    registry.connect().await;
    Ok(registry)
}

pub(crate) fn build_llm(config: &AppConfig) -> MultiLlm {
    match MultiLlm::from_path(&config.llm_config) {
        Ok(llm) => llm,
        Err(e) => {
            warn!(error = %e, "LLM config unavailable, chat commands still work");
            MultiLlm::new()
        }
    }
}

/// Roster the agents declared in the servers YAML, each scoped to its
/// declared backends. Without declarations a single general-purpose
/// agent covers every connected backend.
pub(crate) fn build_router(config: &AppConfig, registry: &CapabilityRegistry) -> AgentRouter {
    let roster = match Roster::from_path(&config.servers_config) {
        Ok(roster) => roster,
        Err(e) => {
            warn!(error = %e, "Agent roster unavailable, using the default agent");
            Roster::default()
        }
    };

    let mut router = AgentRouter::new();
    let agents = roster.build(&registry.connected_servers());
    if agents.is_empty() {
        router.add_agent(SequentialAgent::standard(
            "assistant",
            "General-purpose assistant that can use every connected tool",
            Vec::new(),
        ));
    } else {
        for agent in agents {
            router.add_agent(agent);
        }
    }
    router
}

struct ChatSession {
    registry: CapabilityRegistry,
    llm: MultiLlm,
    store: MemoryStore,
    router: AgentRouter,
    user_id: String,
}

impl ChatSession {
    async fn start(config: AppConfig, user: &str) -> anyhow::Result<Self> {
        let registry = build_registry(&config).await?;
        let llm = build_llm(&config);
        let store = MemoryStore::from_path(&config.db_path).await?;
        let router = build_router(&config, &registry);

        Ok(Self {
            registry,
            llm,
            store,
            router,
            user_id: user.to_string(),
        })
    }

    async fn run_loop(&mut self) {
        println!("{}", "=".repeat(50));
        println!("Courier Chat");
        println!("{}", "=".repeat(50));
        println!("Type a message to chat, or /help for commands.");

        let mut shutdown = false;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while !shutdown {
            print!("\n> ");
            let _ = std::io::stdout().flush();

            let line = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    shutdown = true;
                    println!("\nShutting down...");
                    continue;
                }
                line = lines.next_line() => line,
            };

            let input = match line {
                Ok(Some(input)) => input.trim().to_string(),
                Ok(None) | Err(_) => break,
            };
            if input.is_empty() {
                continue;
            }

            if input.starts_with('/') {
                if !self.handle_command(&input).await {
                    break;
                }
            } else {
                self.handle_message(&input).await;
            }
        }
    }

    /// Returns false when the session should end.
    async fn handle_command(&mut self, command: &str) -> bool {
        let (cmd, args) = command
            .split_once(' ')
            .map_or((command, ""), |(c, a)| (c, a.trim()));

        match cmd.to_lowercase().as_str() {
            "/help" => self.show_help(),
            "/tools" => self.show_tools(),
            "/resources" => self.show_resources(),
            "/prompts" => self.show_prompts(),
            "/call" => self.call_tool(args).await,
            "/read" => self.read_resource(args).await,
            "/generate" => self.generate_prompt(args).await,
            "/memory" => self.remember(args).await,
            "/exit" => return false,
            other => println!("Unknown command: {other}. Type /help for available commands."),
        }
        true
    }

    fn show_help(&self) {
        println!("\nAvailable Commands:");
        println!("  /help      - Show this help");
        println!("  /tools     - List all available tools");
        println!("  /resources - List all available resources");
        println!("  /prompts   - List all available prompts");
        println!("  /call <tool> <json>     - Call a tool");
        println!("  /read <uri>             - Read a resource");
        println!("  /generate <prompt> <json> - Render a prompt");
        println!("  /memory <message>       - Categorize and store a memory");
        println!("  /exit      - Exit the chat");
    }

    fn show_tools(&self) {
        let tools = self.registry.list_all_tools();
        if tools.is_empty() {
            println!("No tools available.");
            return;
        }
        println!("\nAvailable Tools ({} total):", tools.len());
        for (key, server_id, tool) in &tools {
            println!("{}", "-".repeat(40));
            print!("{}", render_tool(key, server_id, tool));
        }
    }

    fn show_resources(&self) {
        let resources = self.registry.list_all_resources();
        if resources.is_empty() {
            println!("No resources available.");
            return;
        }
        println!("\nAvailable Resources ({} total):", resources.len());
        println!("{}", "-".repeat(40));
        for (uri, server_id, resource) in &resources {
            println!("• {uri}");
            if !resource.name.is_empty() {
                println!("  {}", resource.name);
            }
            println!("  Server: {server_id}");
        }
    }

    fn show_prompts(&self) {
        let prompts = self.registry.list_all_prompts();
        if prompts.is_empty() {
            println!("No prompts available.");
            return;
        }
        println!("\nAvailable Prompts ({} total):", prompts.len());
        println!("{}", "-".repeat(40));
        for (key, _, prompt) in &prompts {
            println!("• {key}");
            if let Some(description) = &prompt.description {
                println!("  {description}");
            }
        }
    }

    async fn call_tool(&self, args: &str) {
        let (name, arguments) = match parse_invocation(args) {
            Ok(parsed) => parsed,
            Err(usage) => {
                println!("{usage}");
                return;
            }
        };

        match self.registry.call_tool(&name, arguments).await {
            Ok(result) => {
                println!("\nTool Result:");
                println!("{}", result.text());
            }
            Err(e) => println!("Error calling tool: {e}"),
        }
    }

    async fn read_resource(&self, uri: &str) {
        if uri.is_empty() {
            println!("Usage: /read <resource_uri>");
            return;
        }
        match self.registry.read_resource(uri).await {
            Ok(result) => {
                for contents in &result.contents {
                    let mime = contents.mime_type.as_deref().unwrap_or("unknown");
                    println!("\nResource Content (MIME: {mime}):");
                    println!("{}", "-".repeat(40));
                    match (&contents.text, &contents.blob) {
                        (Some(text), _) => println!("{text}"),
                        (None, Some(_)) => println!("(binary content)"),
                        (None, None) => println!("(empty)"),
                    }
                }
            }
            Err(e) => println!("Error reading resource: {e}"),
        }
    }

    async fn generate_prompt(&self, args: &str) {
        let (name, arguments) = match parse_invocation(args) {
            Ok(parsed) => parsed,
            Err(_) => {
                println!("Usage: /generate <prompt_name> <json_arguments>");
                return;
            }
        };

        match self.registry.generate_prompt(&name, arguments).await {
            Ok(result) => {
                println!("\nGenerated Prompt:");
                println!("{}", "-".repeat(40));
                for message in &result.messages {
                    println!("[{}]", message.role.to_uppercase());
                    if let Some(text) = message.content.as_text() {
                        println!("{text}");
                    }
                }
            }
            Err(e) => println!("Error generating prompt: {e}"),
        }
    }

    async fn remember(&self, message: &str) {
        if message.is_empty() {
            println!("Usage: /memory <message>");
            return;
        }

        let Some(category) = categorize_memory(&self.llm, message).await else {
            println!("Could not categorize the memory. Is an LLM provider configured?");
            return;
        };

        if !category.is_storable() {
            println!("Not stored: \"{message}\" was judged not applicable for memory.");
            return;
        }

        match self.store.save_memory(&self.user_id, category, message).await {
            Ok(_) => println!("Stored as {category}: \"{message}\""),
            Err(e) => println!("Error storing memory: {e}"),
        }
    }

    async fn handle_message(&self, input: &str) {
        println!("\nThinking...");

        if let Err(e) = self.store.log_message(&self.user_id, "user", input).await {
            warn!(error = %e, "Failed to log message");
        }

        let ctx = StepContext {
            registry: &self.registry,
            llm: &self.llm,
            user_id: &self.user_id,
            agent_name: "router",
            agent_description: "routes user messages",
            servers: &[],
        };
        let routed = self.router.route(input, &ctx).await;

        if let Some(agent) = &routed.agent {
            println!("[{agent}] {}", routed.response.message);
        } else {
            println!("{}", routed.response.message);
        }

        if let Err(e) = self
            .store
            .log_message(&self.user_id, "assistant", &routed.response.message)
            .await
        {
            warn!(error = %e, "Failed to log reply");
        }
    }
}

/// Ask the LLM to file a message under a memory category. `None` means
/// no provider was reachable.
pub(crate) async fn categorize_memory(llm: &MultiLlm, message: &str) -> Option<MemoryCategory> {
    let prompt = format!(
        "Categorize the following user message into exactly one of: \
         profile (stable facts about the user), preference (likes, \
         dislikes, standing choices), context (situational facts about \
         ongoing work or plans), not_applicable (not worth remembering).\n\n\
         Message: \"{message}\"\n\n\
         Respond with only the category word."
    );

    let request = CompletionRequest::new(vec![Message::user(prompt)]).with_temperature(0.0);
    match llm.generate_response(None, request).await {
        Ok(response) => Some(MemoryCategory::parse(&response.content)),
        Err(e) => {
            warn!(error = %e, "Memory categorization failed");
            None
        }
    }
}

/// Parse `<name> <json arguments>` for /call and /generate.
fn parse_invocation(args: &str) -> Result<(String, Value), String> {
    let Some((name, json)) = args.split_once(' ') else {
        return Err("Usage: /call <tool_name> <json_arguments>".to_string());
    };
    let arguments: Value = serde_json::from_str(json.trim())
        .map_err(|_| "Error: invalid JSON in arguments".to_string())?;
    Ok((name.to_string(), arguments))
}

/// Pretty-print one tool catalog entry.
fn render_tool(key: &str, server_id: &str, tool: &Tool) -> String {
    let mut out = format!("• {key}\n  (from: {server_id})\n");

    if !tool.description.is_empty() {
        out.push_str(&format!("\n  {}\n", tool.description));
    }

    if let Some(properties) = tool
        .input_schema
        .get("properties")
        .and_then(Value::as_object)
    {
        if !properties.is_empty() {
            let required: Vec<&str> = tool
                .input_schema
                .get("required")
                .and_then(Value::as_array)
                .map(|names| names.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();

            out.push_str("\n  Arguments:\n");
            for (name, details) in properties {
                let arg_type = details
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("any");
                let req = if required.contains(&name.as_str()) {
                    " (required)"
                } else {
                    ""
                };
                let default = details
                    .get("default")
                    .map(|d| format!(" (default: {d})"))
                    .unwrap_or_default();
                out.push_str(&format!("    - {name} [{arg_type}]{req}{default}\n"));
                if let Some(description) = details.get("description").and_then(Value::as_str) {
                    out.push_str(&format!("      {description}\n"));
                }
            }
        }
    }

    out
}
