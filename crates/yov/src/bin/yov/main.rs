mod cli;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("YOV_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Render(render_cli) => render(render_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn render(cli: cli::RenderCommand) -> anyhow::Result<()> {
    let mut documents = yov::load::load_files(&cli.files)?;
    anyhow::ensure!(!documents.items().is_empty(), "No documents loaded");

    let overlays = yov::load::load_files(&cli.overlays)?;
    yov::overlay::apply(&mut documents, &overlays)?;

    output(&cli.output, &documents)
}

fn output(output: &cli::OutputArgs, documents: &yov::node::Node) -> anyhow::Result<()> {
    let rendered = match output.format {
        cli::OutputFormat::Yaml => yov::render::to_yaml(documents)?,
        cli::OutputFormat::Json => yov::render::to_json(documents)?,
    };
    print!("{rendered}");

    Ok(())
}

/// (yov-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    match cli.command {
        Tree { files } => {
            let documents = yov::load::load_files(&files)?;
            println!("{documents:#?}");
        }
    }

    Ok(())
}
