//! Builtin fabric resource types
//!
//! Keys are tenant-relative: the tenant is the forest key, so no type
//! carries a tenant segment.

use super::registry::ResourceDescriptor;

pub(crate) fn builtin_descriptors() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor::new("Tenant")
            .own("name")
            .attrs(&["display_name", "descr"]),
        ResourceDescriptor::new("VRF")
            .own("name")
            .attrs(&["display_name", "policy_enforcement_pref"]),
        ResourceDescriptor::new("BridgeDomain").own("name").attrs(&[
            "display_name",
            "vrf_name",
            "enable_arp_flood",
            "enable_routing",
            "l2_unknown_unicast_mode",
            "l3out_names",
        ]),
        ResourceDescriptor::new("Subnet")
            .parent("BridgeDomain", "bd_name")
            .own("gw_ip_mask")
            .attrs(&["display_name", "scope"]),
        ResourceDescriptor::new("ApplicationProfile")
            .own("name")
            .attrs(&["display_name"]),
        ResourceDescriptor::new("EndpointGroup")
            .parent("ApplicationProfile", "app_profile_name")
            .own("name")
            .attrs(&[
                "display_name",
                "bd_name",
                "provided_contract_names",
                "consumed_contract_names",
                "physical_domain_names",
                "openstack_vmm_domain_names",
            ]),
        ResourceDescriptor::new("Contract")
            .own("name")
            .attrs(&["display_name", "scope"]),
        ResourceDescriptor::new("ContractSubject")
            .parent("Contract", "contract_name")
            .own("name")
            .attrs(&["display_name", "in_filters", "out_filters", "bi_filters"]),
        ResourceDescriptor::new("Filter")
            .own("name")
            .attrs(&["display_name"]),
        ResourceDescriptor::new("FilterEntry")
            .parent("Filter", "filter_name")
            .own("name")
            .attrs(&[
                "display_name",
                "ether_type",
                "ip_protocol",
                "source_from_port",
                "source_to_port",
                "dest_from_port",
                "dest_to_port",
            ]),
        ResourceDescriptor::new("L3Outside")
            .own("name")
            .attrs(&["display_name", "vrf_name", "l3_domain_dn"]),
        ResourceDescriptor::new("ExternalNetwork")
            .parent("L3Outside", "l3out_name")
            .own("name")
            .attrs(&[
                "display_name",
                "nat_epg_dn",
                "provided_contract_names",
                "consumed_contract_names",
            ]),
        ResourceDescriptor::new("ExternalSubnet")
            .parent("L3Outside", "l3out_name")
            .parent("ExternalNetwork", "external_network_name")
            .own("cidr")
            .attrs(&["display_name"]),
        ResourceDescriptor::new("HostLink")
            .parent("Host", "host_name")
            .own("interface_name")
            .attrs(&["interface_mac", "switch_id", "module", "port", "path"]),
    ]
}
