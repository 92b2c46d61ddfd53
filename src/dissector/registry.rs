use crate::core::error::{DissectError, DissectResult};
use crate::dissector::ip::IpDissector;
use crate::dissector::link::LinkDissector;
use crate::dissector::sip::SipDissector;
use crate::dissector::tcp::TcpDissector;
use crate::dissector::tls::TlsDissector;
use crate::dissector::udp::UdpDissector;
use crate::dissector::websocket::WsDissector;
use crate::dissector::Dissector;
use crate::network::packet::protocol::ProtocolKind;
use log::{debug, warn};
use std::fmt;
use std::sync::{Arc, OnceLock};

static REGISTRY: OnceLock<Arc<DissectorRegistry>> = OnceLock::new();

/// プロトコル種別 → ディセクタの対応表。
///
/// 起動時に一度だけ構築し、以降は読み取り専用で共有する。
pub struct DissectorRegistry {
    dissectors: [Option<Arc<dyn Dissector>>; ProtocolKind::COUNT],
}

impl DissectorRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            dissectors: std::array::from_fn(|_| None),
        }
    }

    pub fn empty() -> Self {
        Self::builder().build()
    }

    pub fn with_builtin() -> Self {
        Self::builder()
            .register(LinkDissector)
            .register(IpDissector)
            .register(UdpDissector)
            .register(TcpDissector)
            .register(TlsDissector)
            .register(WsDissector)
            .register(SipDissector)
            .build()
    }

    pub fn lookup(&self, kind: ProtocolKind) -> Option<&dyn Dissector> {
        self.dissectors[kind.index()].as_deref()
    }

    pub fn is_registered(&self, kind: ProtocolKind) -> bool {
        self.dissectors[kind.index()].is_some()
    }

    pub fn registered(&self) -> impl Iterator<Item = ProtocolKind> + '_ {
        ProtocolKind::ALL
            .into_iter()
            .filter(move |kind| self.is_registered(*kind))
    }
}

impl fmt::Debug for DissectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.registered()).finish()
    }
}

pub struct RegistryBuilder {
    dissectors: [Option<Arc<dyn Dissector>>; ProtocolKind::COUNT],
}

impl RegistryBuilder {
    pub fn register<D: Dissector + 'static>(self, dissector: D) -> Self {
        self.register_shared(Arc::new(dissector))
    }

    // 同じ種別を二度登録した場合は後勝ち
    pub fn register_shared(mut self, dissector: Arc<dyn Dissector>) -> Self {
        let kind = dissector.kind();
        if self.dissectors[kind.index()].replace(dissector).is_some() {
            warn!("ディセクタを上書きしました: {}", kind);
        }
        self
    }

    pub fn build(self) -> DissectorRegistry {
        DissectorRegistry {
            dissectors: self.dissectors,
        }
    }
}

// プロセス全体のレジストリを設定する (一度だけ)
pub fn init(registry: DissectorRegistry) -> DissectResult<Arc<DissectorRegistry>> {
    let registry = Arc::new(registry);
    REGISTRY
        .set(Arc::clone(&registry))
        .map_err(|_| DissectError::RegistryAlreadyInitialized)?;
    debug!("ディセクタレジストリを初期化しました: {:?}", registry);
    Ok(registry)
}

pub fn global() -> DissectResult<Arc<DissectorRegistry>> {
    REGISTRY
        .get()
        .cloned()
        .ok_or(DissectError::RegistryNotInitialized)
}

pub fn find_dissector(kind: ProtocolKind) -> Option<&'static dyn Dissector> {
    REGISTRY.get()?.lookup(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registers_chain_protocols() {
        let registry = DissectorRegistry::with_builtin();
        let registered: Vec<_> = registry.registered().collect();
        assert_eq!(
            registered,
            vec![
                ProtocolKind::Link,
                ProtocolKind::Ip,
                ProtocolKind::Udp,
                ProtocolKind::Tcp,
                ProtocolKind::Tls,
                ProtocolKind::Ws,
                ProtocolKind::Sip,
            ]
        );
        assert!(registry.lookup(ProtocolKind::Rtp).is_none());
        assert_eq!(
            registry.lookup(ProtocolKind::Tcp).map(|d| d.kind()),
            Some(ProtocolKind::Tcp)
        );
    }

    #[test]
    fn test_empty_registry() {
        let registry = DissectorRegistry::empty();
        assert_eq!(registry.registered().count(), 0);
    }

    // グローバルな状態を触るテストはこれ一つに集約する
    #[test]
    fn test_global_init_once() {
        assert!(matches!(global(), Err(DissectError::RegistryNotInitialized)));
        assert!(find_dissector(ProtocolKind::Sip).is_none());

        init(DissectorRegistry::with_builtin()).unwrap();
        assert!(global().is_ok());
        assert!(find_dissector(ProtocolKind::Sip).is_some());

        let again = init(DissectorRegistry::empty());
        assert!(matches!(again, Err(DissectError::RegistryAlreadyInitialized)));
        assert!(find_dissector(ProtocolKind::Sip).is_some());
    }
}
