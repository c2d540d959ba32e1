use anyhow::{Context, Result};
use analysis_core::{LogLevel, OutputFormat, ParameterSet};
use analysis_dispatcher::JobRequest;
use analysis_platform::app::Application;
use analysis_platform::common::{bootstrap, StartupConfig};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;

/// 基因组分析作业命令行
#[derive(Parser, Debug)]
#[command(name = "analysis")]
#[command(version = "1.0.0")]
#[command(about = "基因组分析平台 - 作业生命周期命令行")]
#[command(long_about = "合成工具命令行、创建并执行分析作业、登记作业输出")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 日志级别 (trace/debug/info/warn/error)
    #[arg(short, long, global = true)]
    log_level: Option<LogLevel>,

    /// 日志格式 (json/text/pretty)
    #[arg(long, global = true)]
    log_format: Option<OutputFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 工具清单
    #[command(disable_help_subcommand = true)]
    Tool(ToolCommands),
    /// 作业管理
    Job(JobCommands),
    /// 目录文件
    File(FileCommands),
}

#[derive(Args, Debug)]
struct ToolCommands {
    #[command(subcommand)]
    action: ToolActions,
}

#[derive(Subcommand, Debug)]
enum ToolActions {
    /// 列出工具的合法参数
    Params {
        /// 工具引用 (tool 或 tool.execution)
        tool: String,
    },
    /// 显示工具帮助
    Help {
        tool: String,
        /// 帮助中示例地址的前缀
        #[arg(long, default_value = "http://localhost:8080/")]
        base_url: String,
    },
    /// 合成命令行但不创建作业
    CommandLine {
        tool: String,
        /// 参数 key=v1,v2
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct JobCommands {
    #[command(subcommand)]
    action: JobActions,
}

#[derive(Subcommand, Debug)]
enum JobActions {
    /// 创建作业
    Create {
        tool: String,
        #[arg(long)]
        study: i64,
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// 输出目录的目录文件ID
        #[arg(long)]
        outdir: i64,
        /// 输入文件ID，可重复
        #[arg(long = "input")]
        inputs: Vec<i64>,
        /// 参数 key=v1,v2
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// 创建后立即执行
        #[arg(long)]
        execute: bool,
        /// 只构造作业，不写目录
        #[arg(long, conflicts_with = "execute")]
        simulate: bool,
    },
    /// 登记作业输出
    RecordOutput { job_id: i64 },
    /// 查看作业
    Show { job_id: i64 },
}

#[derive(Args, Debug)]
struct FileCommands {
    #[command(subcommand)]
    action: FileActions,
}

#[derive(Subcommand, Debug)]
enum FileActions {
    /// 注册目录文件夹，可作为作业输出目录
    CreateFolder {
        path: String,
        #[arg(long, default_value_t = 1)]
        study: i64,
    },
}

fn parse_params(assignments: &[String]) -> Result<ParameterSet> {
    let mut params = ParameterSet::new();
    for assignment in assignments {
        params.parse_assignment(assignment)?;
    }
    Ok(params)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("序列化输出失败")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let startup = StartupConfig {
        config_path: cli.config.clone(),
        log_level: cli.log_level,
        log_format: cli.log_format,
    };
    let config = bootstrap(&startup)?;
    let app = Application::new(config)?;

    match cli.command {
        Commands::Tool(cmd) => match cmd.action {
            ToolActions::Params { tool } => print!("{}", app.tool_params(&tool)?),
            ToolActions::Help { tool, base_url } => print!("{}", app.tool_help(&tool, &base_url)?),
            ToolActions::CommandLine { tool, params } => {
                let params = parse_params(&params)?;
                println!("{}", app.command_line(&tool, &params)?);
            }
        },
        Commands::Job(cmd) => match cmd.action {
            JobActions::Create {
                tool,
                study,
                name,
                description,
                outdir,
                inputs,
                params,
                execute,
                simulate,
            } => {
                let mut request = JobRequest::new(study, name, outdir)
                    .with_description(description)
                    .with_inputs(inputs)
                    .with_params(parse_params(&params)?);
                if execute {
                    request = request.executed();
                }
                if simulate {
                    request = request.simulated();
                }
                let job = app.create_job(&tool, request).await?;
                info!("作业已创建: id={}, status={}", job.id, job.status);
                print_json(&job)?;
            }
            JobActions::RecordOutput { job_id } => {
                let report = app.record_output(job_id).await?;
                print_json(&report)?;
                if !report.is_complete() {
                    anyhow::bail!("作业 {} 有 {} 个输出登记失败", job_id, report.failures.len());
                }
            }
            JobActions::Show { job_id } => print_json(&app.show_job(job_id).await?)?,
        },
        Commands::File(cmd) => match cmd.action {
            FileActions::CreateFolder { path, study } => {
                let folder = app.create_folder(study, &path).await?;
                print_json(&json!({ "id": folder.id, "path": folder.path }))?;
            }
        },
    }

    Ok(())
}
