use std::fmt::Write as _;

use hierarchy_browser::{BrowserSession, MenuAction, MenuEntry, SessionOptions};
use hierarchy_model::WPObject;
use hierarchy_platform::AppPaths;

use crate::cli::{BrowseArgs, BrowseCommand};
use crate::error::AppError;
use crate::settings::AppSettings;

pub async fn execute(args: BrowseArgs, settings: &AppSettings) -> Result<(), AppError> {
    let addr = settings.address(args.host, args.port);
    let store_dir = AppPaths::new()
        .map_err(|err| AppError::operation_failed("Locating the parts store", err))?
        .parts_store_dir();
    let options = SessionOptions {
        store_dir,
        hierarchy: settings.class_hierarchy()?,
        limits: settings.executor_limits(),
        poll_interval: settings.poll_interval(),
    };

    let mut session = BrowserSession::connect(&addr, options).await?;
    print!("{}", run(&mut session, args.command).await?);
    Ok(())
}

/// Run one browse command and render what it prints.
///
/// # Errors
/// Provider errors, unknown objects and failing parts.
pub async fn run(session: &mut BrowserSession, command: BrowseCommand) -> Result<String, AppError> {
    let mut out = String::new();
    match command {
        BrowseCommand::Tree { id, depth } => {
            let _ = writeln!(out, "{}", session.info().root_name);
            tree(session, &id, depth, &mut out).await?;
        }
        BrowseCommand::Ls { id } => {
            for object in session.children(&id).await? {
                let _ = writeln!(out, "{}", describe(&object));
            }
        }
        BrowseCommand::Search {
            id,
            term,
            no_recursive,
        } => {
            for object in session.search(&id, &term, !no_recursive).await? {
                let _ = writeln!(out, "{}", describe(&object));
            }
        }
        BrowseCommand::Menu { id } => {
            let object = locate(session, &id).await?;
            for entry in session.menu(&object) {
                let _ = writeln!(out, "{}", menu_line(&entry));
            }
        }
        BrowseCommand::Run { id, unique_id } => {
            let object = locate(session, &id).await?;
            for line in session.run_part(&unique_id, &object).await?.lines {
                let _ = writeln!(out, "{line}");
            }
        }
        BrowseCommand::Parts => {
            for part in session.inventory().iter() {
                let _ = writeln!(
                    out,
                    "{}\t{}\t{}",
                    part.summary.unique_id,
                    part.summary.context_menu_entry_name,
                    part.summary.object_class_list.join(",")
                );
            }
        }
    }
    Ok(out)
}

async fn locate(session: &mut BrowserSession, id: &str) -> Result<WPObject, AppError> {
    session
        .locate(id)
        .await?
        .ok_or_else(|| AppError::object_not_found(id))
}

/// Depth-first listing below `id`, children indented under their parent.
async fn tree(
    session: &mut BrowserSession,
    id: &str,
    depth: usize,
    out: &mut String,
) -> Result<(), AppError> {
    if depth == 0 {
        return Ok(());
    }
    let mut stack: Vec<(WPObject, usize)> = session
        .children(id)
        .await?
        .into_iter()
        .rev()
        .map(|object| (object, 1))
        .collect();

    while let Some((object, level)) = stack.pop() {
        let _ = writeln!(out, "{}{}", "  ".repeat(level), describe(&object));
        if level < depth && object.objects > 0 {
            let children = session.children(&object.id).await?;
            stack.extend(children.into_iter().rev().map(|child| (child, level + 1)));
        }
    }
    Ok(())
}

fn describe(object: &WPObject) -> String {
    if object.objects > 0 {
        format!(
            "{} [{}] ({})  {}",
            object.title, object.class, object.objects, object.id
        )
    } else {
        format!("{} [{}]  {}", object.title, object.class, object.id)
    }
}

fn menu_line(entry: &MenuEntry) -> String {
    match &entry.action {
        MenuAction::RunPart { unique_id } => format!("{}\t{unique_id}", entry.label),
        MenuAction::Authored(_) => entry.label.clone(),
    }
}
