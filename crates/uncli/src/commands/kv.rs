//! `kv` subcommands: the block/unblock lists in Consul KV.

use std::io::Write;
use std::time::Duration;

use serde_json::json;

use uncli_api::{ConsulKv, TransportConfig};
use uncli_config::Settings;
use uncli_core::kv::{self, KvLists, ListName};
use uncli_core::{Console, CoreError, DeviceFormat};

use super::{connect, device_format, load_settings, summarize};
use crate::cli::{GlobalOpts, KvArgs, KvCommand, KvList};
use crate::error::CliError;

pub async fn handle(args: KvArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let settings = load_settings(global)?;
    let (store, address) = open_store(&settings)?;
    let store_err = |err: CoreError| CliError::from_store(&address, err);

    match args.command.unwrap_or(KvCommand::List) {
        KvCommand::List => {
            let lists = KvLists::load(&store).await.map_err(store_err)?;
            print_lists(&lists, device_format(global.output))
        }

        KvCommand::Block(terms) => kv::replace(&store, ListName::Block, &terms.terms)
            .await
            .map_err(store_err),

        KvCommand::Unblock(terms) => kv::replace(&store, ListName::Unblock, &terms.terms)
            .await
            .map_err(store_err),

        KvCommand::Clear(args) => kv::clear(&store, list_name(args.list))
            .await
            .map_err(store_err),

        KvCommand::Sync => {
            let mut session = connect(&settings).await?;
            let mut console = Console::stdio(device_format(global.output));
            let report = kv::sync(&store, &mut session, &mut console)
                .await
                .map_err(store_err)?;
            summarize(&report);
            Ok(())
        }
    }
}

fn open_store(settings: &Settings) -> Result<(ConsulKv, String), CliError> {
    let config = settings.consul_config();
    let transport =
        TransportConfig::default().with_timeout(Duration::from_secs(settings.timeout));

    let store = ConsulKv::new(&config, &transport).map_err(|source| CliError::KvSetup {
        address: config.address.clone(),
        source,
    })?;
    let address = store.base_url().to_string();
    Ok((store, address))
}

fn list_name(list: KvList) -> ListName {
    match list {
        KvList::Block => ListName::Block,
        KvList::Unblock => ListName::Unblock,
    }
}

fn print_lists(lists: &KvLists, format: DeviceFormat) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    match format {
        DeviceFormat::Plain => writeln!(out, "{lists}")?,
        DeviceFormat::Json => {
            let value = json!({ "block": lists.blocked, "unblock": lists.unblocked });
            writeln!(out, "{value}")?;
        }
    }
    Ok(())
}
