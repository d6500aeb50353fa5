use clap::Parser;
use gsplat_lib::{import_ply, parse_header, DepthSorter, ImportOptions, SortOrder, SplatInstance};
use std::error::Error;
use std::fs;
use std::process;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "Gaussian Splat Inspector",
    version = "1.0",
    about = "Inspects, imports and depth-sorts Gaussian splat PLY files"
)]
struct Cli {
    #[arg(
        short = 'i',
        long = "input",
        value_name = "INPUT",
        required = true,
        help = "Path to the input PLY file."
    )]
    input: String,

    #[arg(
        long = "no-presort",
        default_value = "false",
        help = "Keep file order instead of presorting splats by importance."
    )]
    no_presort: bool,

    #[arg(
        short = 's',
        long = "sort-axis",
        value_name = "X,Y,Z",
        help = "Depth-sort the imported instances along this view axis and report timing."
    )]
    sort_axis: Option<String>,

    #[arg(
        long = "front-to-back",
        default_value = "false",
        help = "Sort front to back instead of back to front (only valid with --sort-axis)."
    )]
    front_to_back: bool,
}

fn parse_axis(arg: &str) -> [f32; 3] {
    let parts: Vec<f32> = arg
        .split(',')
        .filter_map(|p| p.trim().parse().ok())
        .collect();
    if parts.len() != 3 {
        eprintln!(
            "Error: --sort-axis expects three comma-separated numbers, got '{}'.",
            arg
        );
        process::exit(1);
    }
    [parts[0], parts[1], parts[2]]
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.front_to_back && cli.sort_axis.is_none() {
        eprintln!("Error: --front-to-back can only be used with --sort-axis (-s).");
        process::exit(1);
    }

    let raw_data = fs::read(&cli.input).unwrap_or_else(|e| {
        eprintln!("Error reading input file {}: {}", cli.input, e);
        process::exit(1);
    });

    println!("Input: {} | {} bytes", cli.input, raw_data.len());

    let header = parse_header(&raw_data)?;
    println!(
        "Header: {} vertices, {} bytes per row, data at byte {}",
        header.vertex_count, header.row_stride, header.header_len
    );
    for (name, offset) in header.fields_by_offset() {
        println!("  +{:<3} {}", offset, name);
    }

    let options = ImportOptions {
        presort_by_importance: !cli.no_presort,
    };

    let start = Instant::now();
    let asset = import_ply(&raw_data, &options)?;
    println!("Import Time: {} ms", start.elapsed().as_millis());

    println!(
        "Splats: {} decoded, {} rows skipped",
        asset.cloud.splat_count, asset.cloud.skipped_rows
    );
    println!(
        "Texture: {}x{} RGBA32UI, {} bytes",
        asset.texture.width,
        asset.texture.height,
        asset.texture.as_bytes().len()
    );
    println!(
        "Instances: {} x {} bytes",
        asset.instances.len(),
        size_of::<SplatInstance>()
    );

    if let Some(arg) = &cli.sort_axis {
        let axis = parse_axis(arg);
        let order = if cli.front_to_back {
            SortOrder::FrontToBack
        } else {
            SortOrder::BackToFront
        };

        let mut sorter = DepthSorter::new();
        let start = Instant::now();
        let indices = sorter.sort_instances(&asset.instances, axis, order);
        let elapsed = start.elapsed().as_micros();

        let mut seen = vec![false; indices.len()];
        for &i in indices {
            seen[i as usize] = true;
        }
        if !seen.iter().all(|&s| s) {
            eprintln!("Error: depth sort produced an incomplete permutation.");
            process::exit(1);
        }
        println!(
            "Sort: {:?} along [{}, {}, {}] | {} instances in {} us",
            order,
            axis[0],
            axis[1],
            axis[2],
            indices.len(),
            elapsed
        );
    }

    Ok(())
}
