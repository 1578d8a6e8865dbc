use clap::Parser;
use taggable::application::{edit_tags, init::init, rename_tag, TagEdit};
use taggable::application::{Aggregator, ConfigService, QueryEngine, Taggable};
use taggable::application::{manage_config::ordering_name, query_engine::to_sql};
use taggable::cli::{format_ids, format_tag_counts, format_tag_list, format_tags};
use taggable::cli::{Cli, Commands, ScopeArgs};
use taggable::domain::{NamePolicy, OptionMap, TagList, TaggableRef, TaggableScope};
use taggable::error::TaggableError;
use taggable::infrastructure::{FileSystemRepository, WorkspaceRepository};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TAGGABLE_LOG";

fn main() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(_) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e.display_with_suggestions());
            std::process::exit(e.exit_code());
        }
    }
}

fn run(cli: Cli) -> Result<(), TaggableError> {
    match cli.command {
        Commands::Init { path, policy } => {
            let policy = NamePolicy::from_str(&policy).map_err(TaggableError::Config)?;
            init(&path, policy)
        }
        Commands::Config { key, value, list } => {
            let repo = FileSystemRepository::discover()?;
            let service = ConfigService::new(repo);

            if list {
                let config = service.list()?;
                println!("name_policy = {}", config.name_policy);
                println!("unique_names = {}", config.unique_names);
                println!("delimiter = {}", config.delimiter);
                println!("busy_timeout_ms = {}", config.busy_timeout_ms);
                println!("created = {}", config.created.to_rfc3339());
                println!("custom_contexts = {}", ordering_name(config.custom_contexts));
                for (name, context) in &config.contexts {
                    println!("contexts.{} = {}", name, ordering_name(*context));
                }
                Ok(())
            } else if let Some(k) = key {
                if let Some(v) = value {
                    service.set(&k, &v)?;
                    println!("Set {} = {}", k, v);
                } else {
                    println!("{}", service.get(&k)?);
                }
                Ok(())
            } else {
                println!("Usage: taggable config [--list | <key> [<value>]]");
                println!("Valid keys: name_policy, unique_names, delimiter, busy_timeout_ms, created, custom_contexts, contexts.<name>");
                Ok(())
            }
        }
        Commands::Set {
            taggable_type,
            id,
            tags,
            on,
        } => assign(&taggable_type, id, &on, &tags, TagEdit::Replace),
        Commands::Add {
            taggable_type,
            id,
            tags,
            on,
        } => assign(&taggable_type, id, &on, &tags, TagEdit::Add),
        Commands::Remove {
            taggable_type,
            id,
            tags,
            on,
        } => assign(&taggable_type, id, &on, &tags, TagEdit::Remove),
        Commands::Show {
            taggable_type,
            id,
            on,
            all,
        } => {
            let repo = FileSystemRepository::discover()?;
            let config = repo.load_config()?;
            let db = repo.open_database()?;
            let mut taggable = Taggable::new(TaggableRef::new(taggable_type, id));

            let contexts = match on {
                Some(context) => vec![context],
                None => db.taggings().contexts_of(taggable.target())?,
            };
            if contexts.is_empty() {
                println!("{} has no tags", taggable.target());
            }
            for context in contexts {
                let list = if all {
                    taggable.all_tags_list(&db, &context)?
                } else {
                    taggable.tag_list(&db, &context)?.clone()
                };
                println!("{}: {}", context, format_tag_list(&list, &config.delimiter));
            }
            Ok(())
        }
        Commands::Tagged {
            scope,
            tags,
            options,
            explain,
        } => {
            let repo = FileSystemRepository::discover()?;
            let config = repo.load_config()?;
            let db = repo.open_database()?;
            let scope = build_scope(&scope)?;
            let options = parse_options(&options)?;
            let names = TagList::parse(&tags, &config.delimiter);

            let engine = QueryEngine::new(db.conn(), db.settings());
            let filter = engine.filter(&scope, names.names(), &options)?;
            if explain {
                if filter.empty {
                    println!("-- no taggable can match");
                } else {
                    let compiled = to_sql(&scope, &filter);
                    println!("{}", compiled.sql);
                    println!("-- params: {:?}", compiled.params);
                }
                return Ok(());
            }

            print!("{}", with_newline(format_ids(&engine.execute(&scope, &filter)?)));
            Ok(())
        }
        Commands::Counts { scope, options } => {
            let repo = FileSystemRepository::discover()?;
            let db = repo.open_database()?;
            let counts = Aggregator::new(db.conn())
                .count_tags(&build_scope(&scope)?, &parse_options(&options)?)?;
            print!("{}", with_newline(format_tag_counts(&counts)));
            Ok(())
        }
        Commands::Tags { scope, options } => {
            let repo = FileSystemRepository::discover()?;
            let db = repo.open_database()?;
            let tags = Aggregator::new(db.conn())
                .list_tags(&build_scope(&scope)?, &parse_options(&options)?)?;
            print!("{}", with_newline(format_tags(&tags)));
            Ok(())
        }
        Commands::Rename { from, to } => {
            let repo = FileSystemRepository::discover()?;
            let mut db = repo.open_database()?;
            let tag = rename_tag(&mut db, &from, &to)?;
            println!("Renamed '{}' to '{}'", from, tag.name);
            Ok(())
        }
    }
}

fn assign(
    taggable_type: &str,
    id: i64,
    context: &str,
    tags: &str,
    edit: TagEdit,
) -> Result<(), TaggableError> {
    let repo = FileSystemRepository::discover()?;
    let config = repo.load_config()?;
    let mut db = repo.open_database()?;
    let target = TaggableRef::new(taggable_type, id);

    let given = TagList::parse(tags, &config.delimiter);
    let change = edit_tags(&mut db, target.clone(), context, &given, edit)?;

    if change.is_changed() {
        println!(
            "{} {}: {} -> {}",
            target,
            context,
            format_tag_list(&change.previous, &config.delimiter),
            format_tag_list(&change.next, &config.delimiter)
        );
    } else {
        println!("{} {}: unchanged", target, context);
    }
    Ok(())
}

fn build_scope(args: &ScopeArgs) -> Result<TaggableScope, TaggableError> {
    match &args.table {
        Some(table) => TaggableScope::table(&args.taggable_type, table, &args.key),
        None => Ok(TaggableScope::tagged(&args.taggable_type)),
    }
}

fn parse_options(pairs: &[String]) -> Result<OptionMap, TaggableError> {
    let mut options = OptionMap::new();
    for pair in pairs {
        options.insert_pair(pair)?;
    }
    Ok(options)
}

fn with_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
