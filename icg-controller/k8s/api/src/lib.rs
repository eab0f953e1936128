#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod networking;

pub use self::networking::{
    destination_rule::{self, DestinationRule, DestinationRuleSpec},
    gateway::{self, Gateway, GatewaySpec},
    service_entry::{self, ServiceEntry, ServiceEntrySpec},
    virtual_service::{self, VirtualService, VirtualServiceSpec},
};
pub use k8s_openapi::NamespaceResourceScope;
pub use kube::{api::ObjectMeta, Resource};
