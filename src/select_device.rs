use crate::error::InitProcessError;
use log::info;
use pnet::datalink::{self, NetworkInterface};
use std::io::{self, Write};

// 設定でインターフェースが指定されていればそれを使い、なければ対話的に選択する
pub fn select_device(configured: Option<&str>) -> Result<NetworkInterface, InitProcessError> {
    let interfaces = datalink::interfaces();

    if let Some(name) = configured {
        return interfaces
            .into_iter()
            .find(|interface| interface.name == name)
            .ok_or_else(|| {
                InitProcessError::DeviceSelectionError(format!("デバイスが見つかりません: {}", name))
            });
    }

    prompt_device(interfaces)
        .map_err(|e| InitProcessError::DeviceSelectionError(e.to_string()))
}

fn prompt_device(
    interfaces: Vec<NetworkInterface>,
) -> Result<NetworkInterface, Box<dyn std::error::Error>> {
    println!("利用可能なデバイス:");
    for (index, interface) in interfaces.iter().enumerate() {
        println!("{}. {}", index + 1, interface.name);
    }

    print!("キャプチャするデバイスの番号を入力してください: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let device_index: usize = input.trim().parse()?;

    if device_index == 0 || device_index > interfaces.len() {
        return Err("無効なデバイス番号です".into());
    }

    let selected_interface = interfaces[device_index - 1].clone();
    info!("選択されたデバイス: {}", selected_interface.name);

    Ok(selected_interface)
}
