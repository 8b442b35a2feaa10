use std::{
    fs::File,
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use sha2::Digest as _;

#[derive(Parser, Debug)]
#[command(name = "paramesh", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the mesh of a surface request.
    Mesh(MeshArgs),
    /// List the devices a backend enumerates.
    Devices(DevicesArgs),
    /// Print the synthesized WGSL of a request.
    Source(SourceArgs),
}

#[derive(Parser, Debug)]
struct MeshArgs {
    /// Input request JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output geometry JSON path.
    #[arg(long)]
    out: PathBuf,

    /// Backend to use; overrides the settings file.
    #[arg(long, value_enum)]
    backend: Option<BackendChoice>,

    /// Context settings JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print SHA-256 digests of the vertex and normal bytes.
    #[arg(long)]
    digest: bool,
}

#[derive(Parser, Debug)]
struct DevicesArgs {
    /// Backend to enumerate; overrides the settings file.
    #[arg(long, value_enum)]
    backend: Option<BackendChoice>,

    /// Context settings JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct SourceArgs {
    /// Input request JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Which program to print.
    #[arg(long, value_enum, default_value_t = KernelChoice::Points)]
    kernel: KernelChoice,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Host,
    Gpu,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KernelChoice {
    Points,
    Mesh,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PARAMESH_LOG")
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Mesh(args) => cmd_mesh(args),
        Command::Devices(args) => cmd_devices(args),
        Command::Source(args) => cmd_source(args),
    }
}

fn load_settings(
    config: Option<&Path>,
    backend: Option<BackendChoice>,
) -> anyhow::Result<paramesh::ContextSettings> {
    let mut settings = match config {
        Some(path) => paramesh::ContextSettings::from_json_file(path)
            .with_context(|| format!("load settings '{}'", path.display()))?,
        None => paramesh::ContextSettings::default(),
    };
    if let Some(choice) = backend {
        settings.backend = match choice {
            BackendChoice::Host => paramesh::BackendKind::Host,
            BackendChoice::Gpu => paramesh::BackendKind::Gpu,
        };
    }
    Ok(settings)
}

fn cmd_mesh(args: MeshArgs) -> anyhow::Result<()> {
    let request = paramesh::SurfaceRequest::from_json_file(&args.in_path)
        .with_context(|| format!("read request '{}'", args.in_path.display()))?;
    let settings = load_settings(args.config.as_deref(), args.backend)?;
    let ctx = paramesh::ComputeContext::new(settings).context("create compute context")?;

    let mesh = ctx.generate_request(request)?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let f = File::create(&args.out)
        .with_context(|| format!("create output '{}'", args.out.display()))?;
    let mut w = BufWriter::new(f);
    mesh.to_writer(&mut w)?;
    w.flush()
        .with_context(|| format!("write output '{}'", args.out.display()))?;

    if args.digest {
        println!("vertices sha256: {}", sha256_hex(&f32_bytes(&mesh.vertices)));
        println!("normals  sha256: {}", sha256_hex(&f32_bytes(&mesh.normals)));
    }
    eprintln!(
        "wrote {} ({} triangles)",
        args.out.display(),
        mesh.triangle_count()
    );
    Ok(())
}

fn cmd_devices(args: DevicesArgs) -> anyhow::Result<()> {
    let settings = load_settings(args.config.as_deref(), args.backend)?;
    let devices = paramesh::device::enumerate_devices(settings.backend, &settings.host)
        .context("enumerate devices")?;
    for (n, device) in devices.iter().enumerate() {
        let marker = if n == settings.device { "*" } else { " " };
        println!("{marker} {n}: {}", device.identity());
    }
    Ok(())
}

fn cmd_source(args: SourceArgs) -> anyhow::Result<()> {
    let spec = paramesh::SurfaceRequest::from_json_file(&args.in_path)
        .with_context(|| format!("read request '{}'", args.in_path.display()))?
        .into_spec();
    let source = match args.kernel {
        KernelChoice::Points => paramesh::kernel::point_source(&spec),
        KernelChoice::Mesh => paramesh::kernel::mesh_source(spec.kind.topology()),
    };
    print!("{}", source.wgsl);
    Ok(())
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
