use colored::Colorize;
use ipam_subnet_engine::output::{
    drafts_csv, format_descriptor, format_enumeration_mode, format_validation,
};
use ipam_subnet_engine::processing::enumerate_descriptor;
use ipam_subnet_engine::{validate_cidr, IpamConfig, IpamService, JsonFileStore};
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Do as little as possible in main.rs as it can't contain any tests
    if let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) {
        eprintln!("log4rs.yml not loaded ({e}), logging disabled");
    }
    dotenv::dotenv().ok();
    log::info!("#Start main()");

    let config = IpamConfig::from_env()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let show_drafts = args.iter().any(|a| a == "--drafts");
    let cidrs: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();
    if cidrs.is_empty() {
        eprintln!("usage: ipam-subnet-engine [--drafts] <cidr>...");
        return Ok(());
    }

    let service = match &config.store_path {
        Some(path) => Some(IpamService::new(JsonFileStore::open(path)?, config.clone())),
        None => None,
    };

    for cidr in cidrs {
        let report = validate_cidr(cidr, &config.validation_policy());
        println!("{}", format_validation(cidr, &report));
        let Some(descriptor) = report.descriptor else {
            continue;
        };
        println!("{}", format_descriptor(&descriptor));

        let enumeration = enumerate_descriptor(
            &descriptor,
            &config.reservation_policy(),
            &config.scale_guard(),
        );
        println!("{}", format_enumeration_mode(&enumeration.mode));

        if let Some(service) = &service {
            match service.check_overlap(cidr, descriptor.family).await? {
                Some(conflict) => println!("  overlap:    {}", conflict.red()),
                None => println!("  overlap:    {}", "none".green()),
            }
        }
        if show_drafts {
            print!("{}", drafts_csv(&enumeration.drafts));
        }
    }

    log::info!("#End main()");
    Ok(())
}
