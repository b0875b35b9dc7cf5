//! Closed registry of declared object classes.
//!
//! Each [`ObjectKind`] maps to exactly one translator. The enum order is
//! also the emission rank inside a container: objects that others point at
//! (files, monitors, profiles) come before the pools and services that use
//! them.

use crate::translators::addresses::{ServiceAddressTranslator, SnatPoolTranslator};
use crate::translators::certificate::{CaBundleTranslator, CertificateTranslator};
use crate::translators::data_group::DataGroupTranslator;
use crate::translators::discovery::AddressDiscoveryTranslator;
use crate::translators::endpoint_policy::EndpointPolicyTranslator;
use crate::translators::firewall::{
    FirewallAddressListTranslator, FirewallPolicyTranslator, FirewallPortListTranslator,
    FirewallRuleListTranslator,
};
use crate::translators::gslb::{GslbKind, GslbTranslator};
use crate::translators::idle_timeout::IdleTimeoutPolicyTranslator;
use crate::translators::irule::{IFileTranslator, IRuleTranslator};
use crate::translators::monitor::MonitorTranslator;
use crate::translators::pool::PoolTranslator;
use crate::translators::profiles::{
    HttpProfileTranslator, PersistTranslator, TcpProfileTranslator, UdpProfileTranslator,
};
use crate::translators::security::{
    DosProfileTranslator, ProtocolInspectionTranslator, SecurityLogProfileTranslator,
};
use crate::translators::service::{ServiceKind, ServiceTranslator};
use crate::translators::structure::{ApplicationTranslator, TenantTranslator};
use crate::translators::tls::{
    CipherGroupTranslator, CipherRuleTranslator, TlsClientTranslator, TlsServerTranslator,
};
use crate::translators::Translator;

/// Every declared class the translator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Tenant,
    Application,
    Certificate,
    CaBundle,
    CipherRule,
    CipherGroup,
    TlsServer,
    TlsClient,
    Monitor,
    IRule,
    IFile,
    DataGroup,
    HttpProfile,
    TcpProfile,
    UdpProfile,
    Persist,
    IdleTimeoutPolicy,
    DosProfile,
    SecurityLogProfile,
    ProtocolInspectionProfile,
    FirewallAddressList,
    FirewallPortList,
    FirewallRuleList,
    FirewallPolicy,
    EndpointPolicy,
    AddressDiscovery,
    Pool,
    ServiceAddress,
    SnatPool,
    ServiceHttp,
    ServiceHttps,
    ServiceTcp,
    ServiceUdp,
    ServiceSctp,
    ServiceL4,
    ServiceGeneric,
    ServiceForwarding,
    GslbDataCenter,
    GslbServer,
    GslbMonitor,
    GslbProberPool,
    GslbTopologyRegion,
    GslbTopologyRecords,
    GslbPool,
    GslbDomain,
}

static TENANT: TenantTranslator = TenantTranslator;
static APPLICATION: ApplicationTranslator = ApplicationTranslator;
static CERTIFICATE: CertificateTranslator = CertificateTranslator;
static CA_BUNDLE: CaBundleTranslator = CaBundleTranslator;
static CIPHER_RULE: CipherRuleTranslator = CipherRuleTranslator;
static CIPHER_GROUP: CipherGroupTranslator = CipherGroupTranslator;
static TLS_SERVER: TlsServerTranslator = TlsServerTranslator;
static TLS_CLIENT: TlsClientTranslator = TlsClientTranslator;
static MONITOR: MonitorTranslator = MonitorTranslator;
static IRULE: IRuleTranslator = IRuleTranslator;
static IFILE: IFileTranslator = IFileTranslator;
static DATA_GROUP: DataGroupTranslator = DataGroupTranslator;
static HTTP_PROFILE: HttpProfileTranslator = HttpProfileTranslator;
static TCP_PROFILE: TcpProfileTranslator = TcpProfileTranslator;
static UDP_PROFILE: UdpProfileTranslator = UdpProfileTranslator;
static PERSIST: PersistTranslator = PersistTranslator;
static IDLE_TIMEOUT: IdleTimeoutPolicyTranslator = IdleTimeoutPolicyTranslator;
static DOS_PROFILE: DosProfileTranslator = DosProfileTranslator;
static SECURITY_LOG: SecurityLogProfileTranslator = SecurityLogProfileTranslator;
static PROTOCOL_INSPECTION: ProtocolInspectionTranslator = ProtocolInspectionTranslator;
static FW_ADDRESS_LIST: FirewallAddressListTranslator = FirewallAddressListTranslator;
static FW_PORT_LIST: FirewallPortListTranslator = FirewallPortListTranslator;
static FW_RULE_LIST: FirewallRuleListTranslator = FirewallRuleListTranslator;
static FW_POLICY: FirewallPolicyTranslator = FirewallPolicyTranslator;
static ENDPOINT_POLICY: EndpointPolicyTranslator = EndpointPolicyTranslator;
static ADDRESS_DISCOVERY: AddressDiscoveryTranslator = AddressDiscoveryTranslator;
static POOL: PoolTranslator = PoolTranslator;
static SERVICE_ADDRESS: ServiceAddressTranslator = ServiceAddressTranslator;
static SNAT_POOL: SnatPoolTranslator = SnatPoolTranslator;
static SERVICE_HTTP: ServiceTranslator = ServiceTranslator::new(ServiceKind::Http);
static SERVICE_HTTPS: ServiceTranslator = ServiceTranslator::new(ServiceKind::Https);
static SERVICE_TCP: ServiceTranslator = ServiceTranslator::new(ServiceKind::Tcp);
static SERVICE_UDP: ServiceTranslator = ServiceTranslator::new(ServiceKind::Udp);
static SERVICE_SCTP: ServiceTranslator = ServiceTranslator::new(ServiceKind::Sctp);
static SERVICE_L4: ServiceTranslator = ServiceTranslator::new(ServiceKind::L4);
static SERVICE_GENERIC: ServiceTranslator = ServiceTranslator::new(ServiceKind::Generic);
static SERVICE_FORWARDING: ServiceTranslator = ServiceTranslator::new(ServiceKind::Forwarding);
static GSLB_DATA_CENTER: GslbTranslator = GslbTranslator::new(GslbKind::DataCenter);
static GSLB_SERVER: GslbTranslator = GslbTranslator::new(GslbKind::Server);
static GSLB_MONITOR: GslbTranslator = GslbTranslator::new(GslbKind::Monitor);
static GSLB_PROBER_POOL: GslbTranslator = GslbTranslator::new(GslbKind::ProberPool);
static GSLB_REGION: GslbTranslator = GslbTranslator::new(GslbKind::TopologyRegion);
static GSLB_RECORDS: GslbTranslator = GslbTranslator::new(GslbKind::TopologyRecords);
static GSLB_POOL: GslbTranslator = GslbTranslator::new(GslbKind::Pool);
static GSLB_DOMAIN: GslbTranslator = GslbTranslator::new(GslbKind::Domain);

impl ObjectKind {
    pub const ALL: [ObjectKind; 45] = [
        ObjectKind::Tenant,
        ObjectKind::Application,
        ObjectKind::Certificate,
        ObjectKind::CaBundle,
        ObjectKind::CipherRule,
        ObjectKind::CipherGroup,
        ObjectKind::TlsServer,
        ObjectKind::TlsClient,
        ObjectKind::Monitor,
        ObjectKind::IRule,
        ObjectKind::IFile,
        ObjectKind::DataGroup,
        ObjectKind::HttpProfile,
        ObjectKind::TcpProfile,
        ObjectKind::UdpProfile,
        ObjectKind::Persist,
        ObjectKind::IdleTimeoutPolicy,
        ObjectKind::DosProfile,
        ObjectKind::SecurityLogProfile,
        ObjectKind::ProtocolInspectionProfile,
        ObjectKind::FirewallAddressList,
        ObjectKind::FirewallPortList,
        ObjectKind::FirewallRuleList,
        ObjectKind::FirewallPolicy,
        ObjectKind::EndpointPolicy,
        ObjectKind::AddressDiscovery,
        ObjectKind::Pool,
        ObjectKind::ServiceAddress,
        ObjectKind::SnatPool,
        ObjectKind::ServiceHttp,
        ObjectKind::ServiceHttps,
        ObjectKind::ServiceTcp,
        ObjectKind::ServiceUdp,
        ObjectKind::ServiceSctp,
        ObjectKind::ServiceL4,
        ObjectKind::ServiceGeneric,
        ObjectKind::ServiceForwarding,
        ObjectKind::GslbDataCenter,
        ObjectKind::GslbServer,
        ObjectKind::GslbMonitor,
        ObjectKind::GslbProberPool,
        ObjectKind::GslbTopologyRegion,
        ObjectKind::GslbTopologyRecords,
        ObjectKind::GslbPool,
        ObjectKind::GslbDomain,
    ];

    /// The declaration `class` string.
    pub fn class_name(self) -> &'static str {
        match self {
            ObjectKind::Tenant => "Tenant",
            ObjectKind::Application => "Application",
            ObjectKind::Certificate => "Certificate",
            ObjectKind::CaBundle => "CA_Bundle",
            ObjectKind::CipherRule => "Cipher_Rule",
            ObjectKind::CipherGroup => "Cipher_Group",
            ObjectKind::TlsServer => "TLS_Server",
            ObjectKind::TlsClient => "TLS_Client",
            ObjectKind::Monitor => "Monitor",
            ObjectKind::IRule => "iRule",
            ObjectKind::IFile => "iFile",
            ObjectKind::DataGroup => "Data_Group",
            ObjectKind::HttpProfile => "HTTP_Profile",
            ObjectKind::TcpProfile => "TCP_Profile",
            ObjectKind::UdpProfile => "UDP_Profile",
            ObjectKind::Persist => "Persist",
            ObjectKind::IdleTimeoutPolicy => "Idle_Timeout_Policy",
            ObjectKind::DosProfile => "DOS_Profile",
            ObjectKind::SecurityLogProfile => "Security_Log_Profile",
            ObjectKind::ProtocolInspectionProfile => "Protocol_Inspection_Profile",
            ObjectKind::FirewallAddressList => "Firewall_Address_List",
            ObjectKind::FirewallPortList => "Firewall_Port_List",
            ObjectKind::FirewallRuleList => "Firewall_Rule_List",
            ObjectKind::FirewallPolicy => "Firewall_Policy",
            ObjectKind::EndpointPolicy => "Endpoint_Policy",
            ObjectKind::AddressDiscovery => "Address_Discovery",
            ObjectKind::Pool => "Pool",
            ObjectKind::ServiceAddress => "Service_Address",
            ObjectKind::SnatPool => "SNAT_Pool",
            ObjectKind::ServiceHttp => "Service_HTTP",
            ObjectKind::ServiceHttps => "Service_HTTPS",
            ObjectKind::ServiceTcp => "Service_TCP",
            ObjectKind::ServiceUdp => "Service_UDP",
            ObjectKind::ServiceSctp => "Service_SCTP",
            ObjectKind::ServiceL4 => "Service_L4",
            ObjectKind::ServiceGeneric => "Service_Generic",
            ObjectKind::ServiceForwarding => "Service_Forwarding",
            ObjectKind::GslbDataCenter => "GSLB_Data_Center",
            ObjectKind::GslbServer => "GSLB_Server",
            ObjectKind::GslbMonitor => "GSLB_Monitor",
            ObjectKind::GslbProberPool => "GSLB_Prober_Pool",
            ObjectKind::GslbTopologyRegion => "GSLB_Topology_Region",
            ObjectKind::GslbTopologyRecords => "GSLB_Topology_Records",
            ObjectKind::GslbPool => "GSLB_Pool",
            ObjectKind::GslbDomain => "GSLB_Domain",
        }
    }

    pub fn from_class(class: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.class_name() == class)
    }

    /// Whether this kind is one of the `Service_*` classes.
    pub fn is_service(self) -> bool {
        matches!(
            self,
            ObjectKind::ServiceHttp
                | ObjectKind::ServiceHttps
                | ObjectKind::ServiceTcp
                | ObjectKind::ServiceUdp
                | ObjectKind::ServiceSctp
                | ObjectKind::ServiceL4
                | ObjectKind::ServiceGeneric
                | ObjectKind::ServiceForwarding
        )
    }

    pub fn translator(self) -> &'static dyn Translator {
        match self {
            ObjectKind::Tenant => &TENANT,
            ObjectKind::Application => &APPLICATION,
            ObjectKind::Certificate => &CERTIFICATE,
            ObjectKind::CaBundle => &CA_BUNDLE,
            ObjectKind::CipherRule => &CIPHER_RULE,
            ObjectKind::CipherGroup => &CIPHER_GROUP,
            ObjectKind::TlsServer => &TLS_SERVER,
            ObjectKind::TlsClient => &TLS_CLIENT,
            ObjectKind::Monitor => &MONITOR,
            ObjectKind::IRule => &IRULE,
            ObjectKind::IFile => &IFILE,
            ObjectKind::DataGroup => &DATA_GROUP,
            ObjectKind::HttpProfile => &HTTP_PROFILE,
            ObjectKind::TcpProfile => &TCP_PROFILE,
            ObjectKind::UdpProfile => &UDP_PROFILE,
            ObjectKind::Persist => &PERSIST,
            ObjectKind::IdleTimeoutPolicy => &IDLE_TIMEOUT,
            ObjectKind::DosProfile => &DOS_PROFILE,
            ObjectKind::SecurityLogProfile => &SECURITY_LOG,
            ObjectKind::ProtocolInspectionProfile => &PROTOCOL_INSPECTION,
            ObjectKind::FirewallAddressList => &FW_ADDRESS_LIST,
            ObjectKind::FirewallPortList => &FW_PORT_LIST,
            ObjectKind::FirewallRuleList => &FW_RULE_LIST,
            ObjectKind::FirewallPolicy => &FW_POLICY,
            ObjectKind::EndpointPolicy => &ENDPOINT_POLICY,
            ObjectKind::AddressDiscovery => &ADDRESS_DISCOVERY,
            ObjectKind::Pool => &POOL,
            ObjectKind::ServiceAddress => &SERVICE_ADDRESS,
            ObjectKind::SnatPool => &SNAT_POOL,
            ObjectKind::ServiceHttp => &SERVICE_HTTP,
            ObjectKind::ServiceHttps => &SERVICE_HTTPS,
            ObjectKind::ServiceTcp => &SERVICE_TCP,
            ObjectKind::ServiceUdp => &SERVICE_UDP,
            ObjectKind::ServiceSctp => &SERVICE_SCTP,
            ObjectKind::ServiceL4 => &SERVICE_L4,
            ObjectKind::ServiceGeneric => &SERVICE_GENERIC,
            ObjectKind::ServiceForwarding => &SERVICE_FORWARDING,
            ObjectKind::GslbDataCenter => &GSLB_DATA_CENTER,
            ObjectKind::GslbServer => &GSLB_SERVER,
            ObjectKind::GslbMonitor => &GSLB_MONITOR,
            ObjectKind::GslbProberPool => &GSLB_PROBER_POOL,
            ObjectKind::GslbTopologyRegion => &GSLB_REGION,
            ObjectKind::GslbTopologyRecords => &GSLB_RECORDS,
            ObjectKind::GslbPool => &GSLB_POOL,
            ObjectKind::GslbDomain => &GSLB_DOMAIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ObjectKind;

    #[test]
    fn class_names_round_trip_and_are_unique() {
        let mut names: Vec<&str> = ObjectKind::ALL.iter().map(|k| k.class_name()).collect();
        for kind in ObjectKind::ALL {
            assert_eq!(ObjectKind::from_class(kind.class_name()), Some(kind));
        }
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ObjectKind::ALL.len());
    }

    #[test]
    fn unknown_classes_are_not_registered() {
        assert_eq!(ObjectKind::from_class("Constants"), None);
        assert_eq!(ObjectKind::from_class("pool"), None);
    }

    #[test]
    fn rank_puts_dependencies_first() {
        assert!(ObjectKind::Monitor < ObjectKind::Pool);
        assert!(ObjectKind::Pool < ObjectKind::ServiceHttp);
        assert!(ObjectKind::Certificate < ObjectKind::TlsServer);
        assert!(ObjectKind::TlsServer < ObjectKind::ServiceHttps);
    }

    #[test]
    fn every_kind_has_a_matching_translator() {
        for kind in ObjectKind::ALL {
            assert_eq!(kind.translator().kind(), kind);
        }
    }
}
