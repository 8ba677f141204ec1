//! The commands available at the prompt.

use anyhow::Result;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::case::{Attachment, Case};
use crate::catalog::{Area, Checkin, Milestone, Project, Status};
use crate::commands::{define_alias, Alias, Ctx, Registry};
use crate::editor::{settle, Draft, Meta, DEFAULT_HEADER, SEPARATOR};
use crate::error::{precondition, CliError};
use crate::links::{self, LinkKind};
use crate::person::Person;
use crate::remote::{CaseAction, EditParams, RemoteClient};
use crate::search::{build_query, CaseSearch};
use crate::session::Session;
use crate::ui;

const TITLE_PLACEHOLDER: &str = "<title>";

/// Header keys shown by `edit`, with the API field each one sets.
const EDIT_FIELDS: &[(&str, &str)] = &[
    ("Title", "sTitle"),
    ("Project", "sProject"),
    ("Area", "sArea"),
    ("Milestone", "sFixFor"),
    ("Priority", "sPriority"),
];

/// Header keys read by `new`, besides `Title` and `Tags`.
const NEW_FIELDS: &[(&str, &str)] = &[
    ("Project", "sProject"),
    ("Area", "sArea"),
    ("Milestone", "sFixFor"),
    ("Assign to", "sPersonAssignedTo"),
    ("Priority", "sPriority"),
];

/// Every built-in command, the `mycases` alias, then `extra_aliases`
/// (`name -> [command, args...]`).
pub fn default_registry(extra_aliases: &BTreeMap<String, Vec<String>>) -> Registry {
    let mut registry = Registry::builder()
        .command(
            &["login", "logon"],
            login,
            "Log on to FogBugz.

    Uses $FBURL, $FBUSER and $FBPASS (or $FBTOKEN), otherwise asks.

    >>> login",
        )
        .command(
            &["logoff", "logout"],
            logoff,
            "Log off from FogBugz.

    >>> logoff",
        )
        .command(
            &["help", "?"],
            help,
            "Show help.

    >>> help
    >>> help search",
        )
        .command(&["whoami"], whoami, "Show the current user.")
        .command(
            &["show"],
            show,
            "Show the current case, or pick another one.

    Typing a case number alone does the same.

    >>> show
    >>> show 1234
    >>> 1234",
        )
        .command(
            &["history"],
            history,
            "List the cases visited so far, or go back to one of them.

    >>> history
    >>> history 2",
        )
        .command(&["back"], back, "Go back to the previously visited case.")
        .command(&["parent"], parent, "Show the parent of the current case.")
        .command(
            &["browse", "b"],
            browse,
            "Open the current case in $BROWSER.",
        )
        .command(&["resolve"], resolve, "Resolve the current case.")
        .command(&["reopen"], reopen, "Reopen the current case.")
        .command(&["reactivate"], reactivate, "Reactivate the current case.")
        .command(&["close"], close, "Close the current case.")
        .command(
            &["assign"],
            assign,
            "Assign the current case to someone.

    Takes a full name, an e-mail address or a person id.

    >>> assign Jane Doe
    >>> assign jane@example.com",
        )
        .command(
            &["comment"],
            comment,
            "Comment on the current case in $EDITOR.

    List files under a \"Files:\" header to attach them.",
        )
        .command(
            &["edit"],
            edit,
            "Edit the current case in $EDITOR.

    Change title, project, area, milestone, priority or tags in the
    header. Text below the separator becomes a comment.",
        )
        .command(
            &["amend"],
            amend,
            "Rewrite the text of an event of the current case.

    >>> amend 4567",
        )
        .command(&["new"], new, "Create a new case in $EDITOR.")
        .command(
            &["notify"],
            notify,
            "Add someone to the notification list of the current case.

    >>> notify Jane Doe",
        )
        .command(&["favorite"], favorite, "Star the current case.")
        .command(&["unfavorite"], unfavorite, "Unstar the current case.")
        .command(&["favorites"], favorites, "List starred cases.")
        .command(
            &["search"],
            search,
            "Search for cases.

    A key=value term is sent as key:value.

    >>> search printer
    >>> search assignedTo:\"Jane Doe\" status:Active",
        )
        .command(&["print"], print, "Print the last search results again.")
        .command(
            &["top"],
            top,
            "List the first cases of the current filter.

    >>> top
    >>> top 25",
        )
        .command(
            &["attachments"],
            attachments,
            "List the attachments of the current case.",
        )
        .command(
            &["attachment"],
            attachment,
            "Open an attachment of the current case in $BROWSER.

    >>> attachment 123",
        )
        .command(&["links"], list_links, "List the links found in the current case.")
        .command(
            &["link"],
            link,
            "Open a link of the current case in $BROWSER.

    >>> link 2",
        )
        .command(&["people"], people, "List people.")
        .command(&["projects"], projects, "List projects.")
        .command(
            &["areas"],
            areas,
            "List areas, optionally of one project.

    >>> areas
    >>> areas Inbox",
        )
        .command(
            &["milestones"],
            milestones,
            "List milestones, optionally of one project.",
        )
        .command(&["statuses"], statuses, "List statuses.")
        .command(
            &["checkins"],
            checkins,
            "List the source checkins of the current case.",
        )
        .command(
            &["alias"],
            alias,
            "List aliases, or define one.

    >>> alias
    >>> alias mine search assignedTo:me",
        )
        .command(&["quit", "exit", "bye"], quit, "Quit.")
        .alias("mycases", "search", &["assignedTo:me", "status:open"])
        .build();

    for (name, parts) in extra_aliases {
        let Some((command, args)) = parts.split_first() else {
            tracing::warn!(alias = %name, "ignoring empty alias");
            continue;
        };
        if let Err(e) = registry.alias(name, command, args.to_vec()) {
            tracing::warn!(alias = %name, error = %e, "ignoring alias");
        }
    }
    registry
}

fn parse_number<T: FromStr>(arg: &str, what: &str) -> Result<T, CliError> {
    arg.parse()
        .map_err(|_| CliError::Precondition(format!("Not a valid {what}: {arg}")))
}

fn required<'a>(args: &'a [String], usage: &str) -> Result<&'a str, CliError> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| CliError::Precondition(format!("Usage: {usage}")))
}

fn describe(alias: &Alias) -> String {
    std::iter::once(&alias.command)
        .chain(&alias.args)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

fn login(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let me = ctx.session.login()?;
    writeln!(ctx.out, "Logged in as {me}")?;
    Ok(())
}

fn logoff(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    ctx.session.logoff()?;
    writeln!(ctx.out, "Logged off")?;
    Ok(())
}

fn help(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    let Some(name) = args.first() else {
        writeln!(ctx.out, "FogBugz CLI help\n\nAvailable commands:")?;
        for (name, command) in ctx.commands {
            writeln!(ctx.out, "{:>12} - {}", name, command.desc())?;
        }
        if !ctx.aliases.is_empty() {
            writeln!(ctx.out, "\nAliases:")?;
            for (name, alias) in ctx.aliases.iter() {
                writeln!(ctx.out, "{:>12} - {}", name, describe(alias))?;
            }
        }
        writeln!(ctx.out, "\nType \"help <cmd>\" for more.")?;
        return Ok(());
    };
    if let Some(command) = ctx.commands.get(name) {
        writeln!(ctx.out, "{}", command.help())?;
    } else if let Some(alias) = ctx.aliases.get(name) {
        writeln!(ctx.out, "Alias for `{}`", describe(alias))?;
    } else {
        precondition!("Unknown command: {}", name);
    }
    Ok(())
}

fn whoami(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let me = ctx.session.require_user()?;
    writeln!(ctx.out, "{me}")?;
    Ok(())
}

fn show(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    if let Some(arg) = args.first() {
        let id = parse_number(arg, "case id")?;
        ctx.session.open_case(id)?;
    }
    print_case(ctx)
}

fn print_case(ctx: &mut Ctx<'_>) -> Result<()> {
    let opened_by = ctx.session.require_case()?.opened_by;
    let opener = opener_name(ctx.session, opened_by)?;
    let case = ctx.session.require_case()?;
    writeln!(ctx.out, "{}", case.render(&opener))?;
    Ok(())
}

fn opener_name(session: &mut Session, id: u64) -> Result<String> {
    if id == 0 {
        return Ok("?".to_string());
    }
    let person = session.people.get_by_id(session.remote.as_mut(), id)?;
    Ok(person.full_name)
}

/// One line for the current case, printed after it changed.
fn print_summary(ctx: &mut Ctx<'_>) -> Result<()> {
    let case = ctx.session.require_case()?;
    writeln!(ctx.out, "{}", case.short())?;
    Ok(())
}

fn history(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    if let Some(arg) = args.first() {
        let index: usize = parse_number(arg, "history index")?;
        let Some(entry) = ctx.session.history.get(index) else {
            precondition!("No history entry {}", index);
        };
        let id = entry.id;
        ctx.session.open_case(id)?;
        return print_case(ctx);
    }
    if ctx.session.history.is_empty() {
        writeln!(ctx.out, "No cases visited yet.")?;
    }
    for (i, case) in ctx.session.history.iter().enumerate() {
        writeln!(ctx.out, "{i:>3} {case}")?;
    }
    Ok(())
}

fn back(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let Some(previous) = ctx.session.history.get(1) else {
        precondition!("No previous case");
    };
    let id = previous.id;
    ctx.session.open_case(id)?;
    print_case(ctx)
}

fn parent(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let case = ctx.session.require_case()?;
    let Some(parent) = case.parent else {
        precondition!("Case {} has no parent", case.id);
    };
    ctx.session.open_case(parent)?;
    print_case(ctx)
}

fn browse(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let case = ctx.session.require_case()?;
    ui::browse(ctx.out, ctx.session.browser.as_deref(), &case.permalink)
}

fn resolve(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    change_state(ctx, CaseAction::Resolve)
}

fn reopen(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    change_state(ctx, CaseAction::Reopen)
}

fn reactivate(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    change_state(ctx, CaseAction::Reactivate)
}

fn close(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    change_state(ctx, CaseAction::Close)
}

/// Checks everything a mutation of the current case needs before the
/// user is asked to write anything.
fn check_mutation(session: &Session, action: CaseAction) -> Result<(), CliError> {
    session.require_user()?;
    session.require_case()?.ensure_permitted(action.name())
}

fn change_state(ctx: &mut Ctx<'_>, action: CaseAction) -> Result<()> {
    check_mutation(ctx.session, action)?;
    let draft = ctx
        .session
        .drafts
        .maybe_write("Add a comment?", DEFAULT_HEADER)?;
    let outcome =
        comment_params(draft.as_ref()).and_then(|params| perform(ctx.session, action, params));
    settle(ctx.session.drafts.as_mut(), outcome)?;
    print_summary(ctx)
}

/// The draft body as a comment, with any listed files attached.
fn comment_params(draft: Option<&Draft>) -> Result<EditParams> {
    let mut params = EditParams::new();
    if let Some(draft) = draft {
        params.set("sEvent", draft.body());
        params.attach(draft.files()?);
    }
    Ok(params)
}

fn perform(session: &mut Session, action: CaseAction, params: EditParams) -> Result<()> {
    let (case, remote, actor) = session.edit_parts()?;
    case.perform(remote, &actor, action, params)?;
    session.touch_current();
    Ok(())
}

fn find_person(session: &mut Session, who: &str) -> Result<Person> {
    if who.trim().is_empty() {
        precondition!("Who?");
    }
    match session.people.best_guess(session.remote.as_mut(), who)? {
        Some(person) => Ok(person),
        None => precondition!("Unknown person: {}", who),
    }
}

fn assign(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    check_mutation(ctx.session, CaseAction::Assign)?;
    let who = args.join(" ");
    if who.trim().is_empty() {
        precondition!("Assign to whom?");
    }
    let assignee = find_person(ctx.session, &who)?;
    let draft = ctx
        .session
        .drafts
        .maybe_write("Add a comment?", DEFAULT_HEADER)?;
    let outcome = comment_params(draft.as_ref()).and_then(|params| {
        let (case, remote, actor) = ctx.session.edit_parts()?;
        case.assign(remote, &actor, &assignee.full_name, params)?;
        ctx.session.touch_current();
        Ok(())
    });
    settle(ctx.session.drafts.as_mut(), outcome)?;
    print_summary(ctx)
}

fn comment(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    check_mutation(ctx.session, CaseAction::Edit)?;
    let draft = ctx.session.drafts.write(DEFAULT_HEADER)?;
    let outcome = draft
        .abort_if_empty()
        .map_err(anyhow::Error::from)
        .and_then(|()| comment_params(Some(&draft)))
        .and_then(|params| perform(ctx.session, CaseAction::Edit, params));
    settle(ctx.session.drafts.as_mut(), outcome)?;
    print_summary(ctx)
}

/// Renders `value` so it reads back as the same YAML string.
fn yaml_scalar(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    serde_yaml::to_string(value)
        .map(|y| y.trim_end().to_string())
        .unwrap_or_else(|_| value.to_string())
}

fn header_line(key: &str, value: &str) -> String {
    let value = yaml_scalar(value);
    if value.is_empty() {
        format!("{key}:\n")
    } else {
        format!("{key}: {value}\n")
    }
}

/// `Tags` as a YAML list or a comma-separated string.
fn tag_list(meta: &Meta) -> Vec<String> {
    meta.list("Tags")
        .iter()
        .flat_map(|t| t.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn edit(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    check_mutation(ctx.session, CaseAction::Edit)?;
    let case = ctx.session.require_case()?;
    let current: Vec<String> = [
        &case.title,
        &case.project,
        &case.area,
        &case.milestone,
        &case.priority,
    ]
    .into_iter()
    .cloned()
    .collect();
    let tags = case.tags.clone();

    let mut header: String = EDIT_FIELDS
        .iter()
        .zip(&current)
        .map(|((key, _), value)| header_line(key, value))
        .collect();
    header.push_str(&header_line("Tags", &tags.join(", ")));
    header.push_str(&format!("{SEPARATOR}\n\n"));

    let draft = ctx.session.drafts.write(&header)?;
    let outcome = edit_params(&draft, &current, &tags)
        .and_then(|params| perform(ctx.session, CaseAction::Edit, params));
    settle(ctx.session.drafts.as_mut(), outcome)?;
    print_summary(ctx)
}

/// Changed header fields plus the body as a comment. Aborts when nothing
/// changed.
fn edit_params(draft: &Draft, current: &[String], tags: &[String]) -> Result<EditParams> {
    let meta = draft.meta()?;
    let mut params = EditParams::new();
    for ((key, field), old) in EDIT_FIELDS.iter().zip(current) {
        if let Some(new) = meta.get(key) {
            if new.trim() != old.as_str() {
                params.set(field, new.trim());
            }
        }
    }
    let new_tags = tag_list(&meta);
    if new_tags != tags {
        params.set("sTags", new_tags.join(","));
    }
    params.set("sEvent", draft.body());
    params.attach(draft.files()?);
    if params.fields().is_empty() && params.uploads().is_empty() {
        return Err(CliError::Aborted.into());
    }
    Ok(params)
}

fn amend(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    let id: u64 = parse_number(required(args, "amend EVENT_ID")?, "event id")?;
    check_mutation(ctx.session, CaseAction::Edit)?;
    let case = ctx.session.require_case()?;
    let Some(event) = case.event(id) else {
        precondition!("Event {} does not belong to case {}", id, case.id);
    };
    let header = format!("{SEPARATOR}\n{}\n", event.text);

    let draft = ctx.session.drafts.write(&header)?;
    let outcome = draft
        .abort_if_empty()
        .map_err(anyhow::Error::from)
        .and_then(|()| {
            let (case, remote, _) = ctx.session.edit_parts()?;
            case.amend(remote, id, &draft.body())?;
            ctx.session.touch_current();
            Ok(())
        });
    settle(ctx.session.drafts.as_mut(), outcome)?;
    print_summary(ctx)
}

fn new(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let me = ctx.session.require_user()?.full_name.clone();
    let mut header = header_line("Title", TITLE_PLACEHOLDER);
    for (key, _) in NEW_FIELDS {
        let value = if *key == "Assign to" { me.as_str() } else { "" };
        header.push_str(&header_line(key, value));
    }
    header.push_str(&header_line("Tags", ""));
    header.push_str(&format!("{SEPARATOR}\n\n"));

    let draft = ctx.session.drafts.write(&header)?;
    let outcome = new_params(&draft).and_then(|params| {
        let case = Case::create(ctx.session.remote.as_mut(), &params)?;
        ctx.session.set_current_case(case);
        Ok(())
    });
    settle(ctx.session.drafts.as_mut(), outcome)?;
    print_case(ctx)
}

fn new_params(draft: &Draft) -> Result<EditParams> {
    let meta = draft.meta()?;
    let title = meta.get("Title").unwrap_or_default();
    let title = title.trim();
    if title.is_empty() || title == TITLE_PLACEHOLDER {
        if draft.is_empty() {
            return Err(CliError::Aborted.into());
        }
        precondition!("A new case needs a title");
    }
    let mut params = EditParams::new().with("sTitle", title);
    for (key, field) in NEW_FIELDS {
        if let Some(value) = meta.get(key) {
            params.set(field, value);
        }
    }
    params.set("sTags", tag_list(&meta).join(","));
    params.set("sEvent", draft.body());
    params.attach(draft.files()?);
    Ok(params)
}

fn notify(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    let case = ctx.session.require_case()?;
    let (id, latest) = (case.id, case.latest_event);
    let person = find_person(ctx.session, &args.join(" "))?;
    ctx.session.remote.notify(id, latest, person.id)?;
    writeln!(ctx.out, "Notified {person}")?;
    Ok(())
}

fn favorite(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let case = ctx.session.require_case()?;
    let (id, category) = (case.id, case.category.clone());
    ctx.session.remote.favorite(id, &category)?;
    writeln!(ctx.out, "Starred {}", ui::case_id(id))?;
    Ok(())
}

fn unfavorite(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let case = ctx.session.require_case()?;
    let (id, category) = (case.id, case.category.clone());
    ctx.session.remote.unfavorite(id, &category)?;
    writeln!(ctx.out, "Unstarred {}", ui::case_id(id))?;
    Ok(())
}

fn favorites(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let ids = ctx.session.remote.favorites()?;
    let found = if ids.is_empty() {
        CaseSearch::default()
    } else {
        let query = ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        CaseSearch::search(ctx.session.remote.as_mut(), &query)?
    };
    print_search(ctx, found)
}

fn print_search(ctx: &mut Ctx<'_>, found: CaseSearch) -> Result<()> {
    writeln!(ctx.out, "{found}")?;
    ctx.session.last_search = Some(found);
    Ok(())
}

fn search(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    let query = build_query(args);
    let found = CaseSearch::search(ctx.session.remote.as_mut(), &query)?;
    print_search(ctx, found)
}

fn print(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let Some(found) = &ctx.session.last_search else {
        precondition!("Nothing to print. Search first.");
    };
    writeln!(ctx.out, "{found}")?;
    Ok(())
}

fn top(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    let max = match args.first() {
        Some(arg) => parse_number(arg, "number of cases")?,
        None => ctx.session.top,
    };
    let found = CaseSearch::top(ctx.session.remote.as_mut(), max)?;
    print_search(ctx, found)
}

fn attachments(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let case = ctx.session.require_case()?;
    let mut any = false;
    for attachment in case.attachments() {
        any = true;
        writeln!(
            ctx.out,
            "{} {}",
            ui::attachment_id(attachment.id),
            attachment.file_name
        )?;
    }
    if !any {
        writeln!(ctx.out, "No attachments.")?;
    }
    Ok(())
}

fn attachment(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    let id: u64 = parse_number(required(args, "attachment ID")?, "attachment id")?;
    let case = ctx.session.require_case()?;
    let Some(attachment) = case.attachment(id) else {
        precondition!("Case {} has no attachment {}", case.id, id);
    };
    let url = download_url(ctx.session.remote.as_ref(), attachment);
    ui::browse(ctx.out, ctx.session.browser.as_deref(), &url)
}

/// Tracker-hosted files need the session token; external links don't.
fn download_url(remote: &dyn RemoteClient, attachment: &Attachment) -> String {
    if links::is_absolute(&attachment.url) {
        attachment.url.clone()
    } else {
        remote.full_url_with_token(&attachment.url)
    }
}

fn list_links(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let case = ctx.session.require_case()?;
    let mut any = false;
    for link in case.links() {
        any = true;
        match &link.kind {
            LinkKind::Url => writeln!(ctx.out, "{} {}", ui::link_id(link.index), link.url)?,
            LinkKind::Image => writeln!(
                ctx.out,
                "{} {} {}",
                ui::link_id(link.index),
                link.url,
                ui::darkgray("(image)")
            )?,
            LinkKind::Anchor { text } => writeln!(
                ctx.out,
                "{} {} {}",
                ui::link_id(link.index),
                link.url,
                ui::darkgray(format!("({text})"))
            )?,
        }
    }
    if !any {
        writeln!(ctx.out, "No links.")?;
    }
    Ok(())
}

fn link(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    let index: usize = parse_number(required(args, "link N")?, "link number")?;
    let case = ctx.session.require_case()?;
    let Some(link) = case.link(index) else {
        precondition!("Case {} has no link {}", case.id, index);
    };
    ui::browse(ctx.out, ctx.session.browser.as_deref(), &link.url)
}

fn people(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let mut everyone = ctx.session.people.load_all(ctx.session.remote.as_mut())?;
    everyone.sort_by(|a, b| a.full_name.cmp(&b.full_name));
    for person in everyone {
        writeln!(ctx.out, "{} {}", ui::darkgray(format!("{:>5}", person.id)), person)?;
    }
    Ok(())
}

fn projects(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    for project in ctx.session.remote.list_projects()? {
        writeln!(ctx.out, "{}", Project::from(project))?;
    }
    Ok(())
}

fn project_filter(args: &[String]) -> Option<String> {
    let project = args.join(" ");
    (!project.trim().is_empty()).then_some(project)
}

fn areas(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    let project = project_filter(args);
    for area in ctx.session.remote.list_areas(project.as_deref())? {
        writeln!(ctx.out, "{}", Area::from(area))?;
    }
    Ok(())
}

fn milestones(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    let project = project_filter(args);
    for milestone in ctx.session.remote.list_milestones(project.as_deref())? {
        writeln!(ctx.out, "{}", Milestone::from(milestone))?;
    }
    Ok(())
}

fn statuses(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    for status in ctx.session.remote.list_statuses()? {
        writeln!(ctx.out, "{}", Status::from(status))?;
    }
    Ok(())
}

fn checkins(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    let id = ctx.session.require_case()?.id;
    let found = ctx.session.remote.checkins(id)?;
    if found.is_empty() {
        writeln!(ctx.out, "No checkins.")?;
    }
    for checkin in found {
        writeln!(ctx.out, "{}", Checkin::from(checkin))?;
    }
    Ok(())
}

fn alias(ctx: &mut Ctx<'_>, args: &[String]) -> Result<()> {
    match args {
        [] => {
            for (name, alias) in ctx.aliases.iter() {
                writeln!(ctx.out, "{name} = {}", describe(alias))?;
            }
        }
        [_] => precondition!("Usage: alias NAME COMMAND [ARGS...]"),
        [name, command, rest @ ..] => {
            define_alias(ctx.commands, ctx.aliases, name, command, rest.to_vec())?;
            writeln!(ctx.out, "{name} = {}", describe(&ctx.aliases[name.as_str()]))?;
        }
    }
    Ok(())
}

fn quit(ctx: &mut Ctx<'_>, _args: &[String]) -> Result<()> {
    writeln!(ctx.out, "Bye!")?;
    ctx.session.quit_requested = true;
    Ok(())
}
