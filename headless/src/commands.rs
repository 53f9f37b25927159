use std::collections::HashMap;

use citysprint::{ClientConfig, Error, EntityType, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Tool(String),
    Color(String),
    Click { x: f64, y: f64 },
    Cell { column: i32, row: i32 },
    Clear,
    Status,
    Quit,
}

pub fn parse(line: &str) -> std::result::Result<Command, String> {
    let args: Vec<&str> = line.split_whitespace().collect();
    let Some(&name) = args.first() else { return Err("empty command".into()) };
    match name {
        "tool" => Ok(Command::Tool(arg(&args, 1)?.to_string())),
        "color" => Ok(Command::Color(arg(&args, 1)?.to_string())),
        "click" => {
            let x = arg(&args, 1)?.parse::<f64>().map_err(|_| "click x must be a number".to_string())?;
            let y = arg(&args, 2)?.parse::<f64>().map_err(|_| "click y must be a number".to_string())?;
            Ok(Command::Click { x, y })
        }
        "cell" => {
            let column = arg(&args, 1)?.parse::<i32>().map_err(|_| "cell column must be an integer".to_string())?;
            let row = arg(&args, 2)?.parse::<i32>().map_err(|_| "cell row must be an integer".to_string())?;
            Ok(Command::Cell { column, row })
        }
        "clear" => Ok(Command::Clear),
        "status" => Ok(Command::Status),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command: {}", other)),
    }
}

fn arg<'a>(args: &[&'a str], i: usize) -> std::result::Result<&'a str, String> {
    args.get(i).copied().ok_or_else(|| format!("`{}` needs {} arguments", args[0], i))
}

pub fn print_help() {
    println!("CitySprint headless client");
    println!("Commands:");
    println!("  tool <select|move|troop|city|building|coin|...>");
    println!("  color <css color>");
    println!("  click <x> <y>      pixel position on the surface");
    println!("  cell <col> <row>");
    println!("  clear");
    println!("  status");
    println!("  quit");
}

/// Builds the config from `CITYSPRINT_*` variables on top of the defaults.
pub fn config_from_vars(vars: &HashMap<String, String>) -> Result<ClientConfig> {
    let mut config = ClientConfig::default();
    let uint = |key: &str| -> Result<Option<u32>> {
        vars.get(key)
            .map(|v| {
                v.trim()
                    .parse::<u32>()
                    .map_err(|_| Error::Config(format!("{} must be a positive integer, got {:?}", key, v)))
            })
            .transpose()
    };

    if let Some(endpoint) = vars.get("CITYSPRINT_ENDPOINT") {
        config.endpoint = endpoint.clone();
    }
    if let Some(size) = uint("CITYSPRINT_CELL_SIZE")? {
        config.cell_size = size;
    }
    if let Some(width) = uint("CITYSPRINT_WIDTH")? {
        config.surface_width = width;
    }
    if let Some(height) = uint("CITYSPRINT_HEIGHT")? {
        config.surface_height = height;
    }
    if let Some(entity) = vars.get("CITYSPRINT_ENTITY") {
        config.brush_entity = EntityType::from_tag(entity);
    }
    config.greeting = vars.get("CITYSPRINT_GREETING").cloned();

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse("tool select"), Ok(Command::Tool("select".into())));
        assert_eq!(parse("  click 10.5 4 "), Ok(Command::Click { x: 10.5, y: 4.0 }));
        assert_eq!(parse("cell -1 7"), Ok(Command::Cell { column: -1, row: 7 }));
        assert_eq!(parse("exit"), Ok(Command::Quit));
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(parse("").is_err());
        assert!(parse("cell 1").is_err());
        assert!(parse("click a b").is_err());
        assert!(parse("fly 1 2").is_err());
    }

    #[test]
    fn env_overrides_defaults() {
        let config = config_from_vars(&vars(&[
            ("CITYSPRINT_ENDPOINT", "ws://board.local:9001"),
            ("CITYSPRINT_CELL_SIZE", "5"),
            ("CITYSPRINT_ENTITY", "building"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "ws://board.local:9001");
        assert_eq!(config.cell_size, 5);
        assert_eq!(config.brush_entity, EntityType::Building);
        assert_eq!(config.surface_width, 1500);
        assert_eq!(config.greeting, None);
    }

    #[test]
    fn env_rejects_bad_numbers() {
        assert!(config_from_vars(&vars(&[("CITYSPRINT_CELL_SIZE", "big")])).is_err());
        assert!(config_from_vars(&vars(&[("CITYSPRINT_WIDTH", "0")])).is_err());
    }

    #[test]
    fn env_rejects_oversized_surface() {
        let result = config_from_vars(&vars(&[("CITYSPRINT_WIDTH", "40000"), ("CITYSPRINT_HEIGHT", "30000")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
