//! Command handlers.

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use lakeflow::catalog::{Catalog, CommitFilter, CommitMeta, MemoryCatalog, TableChange, TableChanges};
use lakeflow::config::Home;
use lakeflow::core::StageStatus;
use lakeflow::events::LoggingEventSink;
use lakeflow::project;
use lakeflow::runner::{PipelineRunner, RunOptions, RunState};
use lakeflow::table::Table;
use lakeflow::view::{render, ArtifactViewer, Lookup};
use std::path::Path;
use std::sync::Arc;

/// Catalog, home directory and author for one invocation.
pub struct Client {
    home: Home,
    catalog: Arc<MemoryCatalog>,
    author: String,
}

impl Client {
    /// Opens the catalog under the home directory, creating it if needed.
    pub fn open(home: Option<std::path::PathBuf>, author: Option<String>) -> Result<Self> {
        let home = Home::locate(home);
        let config = home.config()?.with_env();
        let author = author.filter(|a| !a.trim().is_empty()).unwrap_or(config.author);
        let catalog = MemoryCatalog::open(home.catalog_path())
            .with_context(|| format!("opening catalog in {}", home.root().display()))?;
        tracing::debug!(home = %home.root().display(), author = %author, "Opened catalog");
        Ok(Self {
            home,
            catalog: Arc::new(catalog),
            author,
        })
    }

    fn reference(&self, reference: Option<String>) -> Result<String> {
        match reference {
            Some(reference) => Ok(reference),
            None => Ok(self.home.current_branch()?),
        }
    }

    fn meta(&self, message: String) -> CommitMeta {
        CommitMeta::new(message, self.author.clone())
    }

    pub fn branch_create(&self, name: &str, from: Option<String>) -> Result<()> {
        let from = self.reference(from)?;
        let commit = self.catalog.create_branch(name, &from)?;
        println!("{} {} at {}", "Created branch".green(), name.bold(), commit.short_id());
        Ok(())
    }

    pub fn branch_delete(&self, name: &str) -> Result<()> {
        self.catalog.delete_branch(name)?;
        println!("{} {}", "Deleted branch".green(), name.bold());
        Ok(())
    }

    pub fn branch_list(&self) -> Result<()> {
        let current = self.home.current_branch()?;
        for (name, head) in self.catalog.list_branches() {
            let marker = if name == current { "*" } else { " " };
            println!("{marker} {:<32} {}", name, short(&head).dimmed());
        }
        Ok(())
    }

    pub fn branch_checkout(&self, name: &str) -> Result<()> {
        if !self.catalog.has_branch(name) {
            bail!("Branch '{name}' does not exist");
        }
        self.home.set_current_branch(name)?;
        println!("{} {}", "Switched to".green(), name.bold());
        Ok(())
    }

    pub fn tag_create(&self, name: &str, reference: Option<String>) -> Result<()> {
        let reference = self.reference(reference)?;
        let commit = self.catalog.create_tag(name, &reference)?;
        println!("{} {} at {}", "Created tag".green(), name.bold(), commit.short_id());
        Ok(())
    }

    pub fn tag_delete(&self, name: &str) -> Result<()> {
        self.catalog.delete_tag(name)?;
        println!("{} {}", "Deleted tag".green(), name.bold());
        Ok(())
    }

    pub fn tag_list(&self) -> Result<()> {
        for (name, commit) in self.catalog.list_tags() {
            println!("  {:<32} {}", name, short(&commit).dimmed());
        }
        Ok(())
    }

    pub async fn run(
        &self,
        project_dir: &Path,
        reference: Option<String>,
        params: &[(String, String)],
        detach: bool,
    ) -> Result<()> {
        let project = project::load(project_dir)
            .with_context(|| format!("loading project from {}", project_dir.display()))?;
        let graph = project.into_pipeline()?.build()?;

        let mut options = RunOptions::new()
            .on(self.reference(reference)?)
            .author(self.author.clone());
        for (name, raw) in params {
            options = options.parameter(name.clone(), project.parse_parameter(name, raw)?);
        }
        options = options.with_defaults(&project.default_parameters()?);
        if detach {
            options = options.detached();
        }

        println!(
            "{} {} on {}",
            "Running".cyan(),
            graph.name().bold(),
            options.target.bold()
        );
        let runner = PipelineRunner::new(self.catalog.clone()).with_event_sink(Arc::new(LoggingEventSink::default()));
        let state = runner.run(&graph, &options).await?;
        print_run(&state);

        if state.is_success() {
            Ok(())
        } else {
            Err(anyhow!(
                "Run {} failed; inspect branch '{}'",
                state.job_id,
                state.run_branch
            ))
        }
    }

    pub fn promote(&self, run_branch: &str, into: &str) -> Result<()> {
        let runner = PipelineRunner::new(self.catalog.clone()).with_event_sink(Arc::new(LoggingEventSink::default()));
        let outcome = runner.promote_branch(run_branch, into)?;
        println!(
            "{} {} into {} at {}",
            "Promoted".green().bold(),
            run_branch,
            into.bold(),
            outcome.commit().short_id()
        );
        Ok(())
    }

    pub fn table_import(&self, name: &str, file: &Path, reference: Option<String>, append: bool) -> Result<()> {
        let branch = self.reference(reference)?;
        let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        let mut table = Table::from_json_str(&text).with_context(|| format!("parsing {}", file.display()))?;
        if append && self.catalog.has_table(name, &branch)? {
            table = self.catalog.get_table(name, &branch)?.append(&table)?;
        }

        let rows = table.num_rows();
        let mut changes = TableChanges::new();
        changes.insert(name.to_string(), TableChange::Put(Arc::new(table)));
        let commit = self.catalog.commit(
            &branch,
            changes,
            self.meta(format!("Import {name} from {}", file.display())),
            None,
        )?;
        println!(
            "{} {} rows into {} on {} ({})",
            "Imported".green(),
            rows,
            name.bold(),
            branch,
            commit.short_id()
        );
        Ok(())
    }

    pub fn table_list(&self, reference: Option<String>) -> Result<()> {
        let reference = self.reference(reference)?;
        for name in self.catalog.list_tables(&reference)? {
            let table = self.catalog.get_table(&name, &reference)?;
            println!("  {:<32} {:>8} rows", name, table.num_rows());
        }
        Ok(())
    }

    pub fn table_show(&self, name: &str, reference: Option<String>, rows: usize) -> Result<()> {
        let reference = self.reference(reference)?;
        let table = self.catalog.get_table(name, &reference)?;
        println!("{}", format!("{name} @ {reference}").bold());
        print!("{}", render::table(&table, rows));
        Ok(())
    }

    pub fn table_delete(&self, name: &str, reference: Option<String>) -> Result<()> {
        let branch = self.reference(reference)?;
        let commit = self
            .catalog
            .delete_table(name, &branch, self.meta(format!("Delete {name}")))?;
        println!("{} {} on {} ({})", "Deleted".green(), name.bold(), branch, commit.short_id());
        Ok(())
    }

    pub fn table_revert(&self, name: &str, from: &str, into: Option<String>, replace: bool) -> Result<()> {
        let into = self.reference(into)?;
        let commit = self.catalog.revert_table(
            name,
            from,
            &into,
            self.meta(format!("Revert {name} to {from}")),
            replace,
        )?;
        println!(
            "{} {} on {} to {} ({})",
            "Reverted".green(),
            name.bold(),
            into,
            from,
            commit.short_id()
        );
        Ok(())
    }

    pub fn commits(&self, reference: Option<String>, by_author: Option<String>, limit: usize) -> Result<()> {
        let reference = self.reference(reference)?;
        let mut filter = CommitFilter::default().limit(limit);
        if let Some(author) = by_author {
            filter = filter.by_author(author);
        }
        for commit in self.catalog.get_commits(&reference, &filter)? {
            println!(
                "{} {} {:<12} {}",
                commit.short_id().yellow(),
                commit.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                commit.author,
                commit.message
            );
            if let Some(job_id) = commit.job_id() {
                println!("             {} {}", "job".dimmed(), job_id.dimmed());
            }
        }
        Ok(())
    }

    pub fn query(&self, sql: &str, reference: Option<String>, rows: usize) -> Result<()> {
        let reference = self.reference(reference)?;
        let table = lakeflow::sql::query(self.catalog.as_ref(), sql, &reference)?;
        print!("{}", render::table(&table, rows));
        Ok(())
    }

    pub fn show(
        &self,
        table: &str,
        reference: Option<String>,
        chart: Option<&str>,
        width: usize,
        rows: usize,
    ) -> Result<()> {
        let reference = self.reference(reference)?;
        let viewer = ArtifactViewer::new(self.catalog.clone());
        let found = match viewer.fetch(&reference, table)? {
            Lookup::Found(found) => found,
            missing => {
                println!("{} {missing}", "Nothing to show:".yellow());
                return Ok(());
            }
        };

        println!("{}", format!("{table} @ {reference}").bold().bright_blue());
        println!();
        match chart {
            Some(spec) => {
                let (label, value) = spec
                    .split_once(':')
                    .ok_or_else(|| anyhow!("--chart expects label:value, got '{spec}'"))?;
                print!("{}", render::bar_chart(&found, label, value, width)?);
            }
            None => print!("{}", render::table(&found, rows)),
        }
        Ok(())
    }
}

pub fn parameter_set(project_dir: &Path, name: &str, raw: &str, secret: bool) -> Result<()> {
    let mut project = project::load(project_dir)
        .with_context(|| format!("loading project from {}", project_dir.display()))?;
    let value = project.set_parameter(name, raw, secret)?;
    project::save(&project, project_dir)?;
    println!("{} {} = {}", "Set parameter".green(), name.bold(), value);
    Ok(())
}

pub fn parameter_list(project_dir: &Path) -> Result<()> {
    let project = project::load(project_dir)
        .with_context(|| format!("loading project from {}", project_dir.display()))?;
    for (name, def) in &project.parameters {
        let default = def
            .default_value(name)?
            .map_or_else(|| "-".dimmed().to_string(), |v| v.to_string());
        let description = def.description.as_deref().unwrap_or_default();
        println!("  {:<24} {:<8} {:<24} {}", name,
            def.param_type.to_string(),
            default,
            description.dimmed());
    }
    Ok(())
}

fn short(id: &str) -> &str {
    &id[..id.len().min(12)]
}

fn print_run(state: &RunState) {
    for stage in &state.stages {
        let status = match stage.status {
            StageStatus::Ok => "ok".green(),
            StageStatus::Fail => "FAIL".red().bold(),
            StageStatus::Skipped => "skipped".yellow(),
            other => other.to_string().normal(),
        };
        let rows = stage.rows.map(|r| format!("{r} rows")).unwrap_or_default();
        println!(
            "  {:<8} {:<28} {:<10} {:>12} {:>8.1} ms",
            status,
            stage.stage,
            stage.materialize.to_string(),
            rows,
            stage.duration_ms
        );
        if let Some(error) = &stage.error {
            println!("           {}", error.red());
        }
    }
    for expectation in &state.expectations {
        if !expectation.passed {
            println!(
                "  {} expectation {} on {} ({})",
                "WARN".yellow().bold(),
                expectation.name,
                expectation.input,
                expectation.policy
            );
        }
    }

    if state.promoted {
        println!("{} {} into {}", "Promoted".green().bold(), state.job_id, state.target_branch.bold());
    } else if state.is_success() {
        println!(
            "{} run branch {} is ready to promote",
            "Detached:".cyan(),
            state.run_branch.bold()
        );
    } else {
        println!("{} {}", "Failed:".red().bold(), state.error.as_deref().unwrap_or("unknown error"));
    }
}
