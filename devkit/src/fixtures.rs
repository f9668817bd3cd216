/*!
Builders de serveurs et composants pour les tests
*/

use vigie_kernel::models::{Component, ComponentCategory, DbId, SnmpVersion, Target};

pub struct TargetBuilder {
    target: Target,
    next_component_id: DbId,
}

impl TargetBuilder {
    fn base(id: DbId, ip: &str, version: SnmpVersion) -> Self {
        Self {
            target: Target {
                id,
                name: format!("srv-{id:02}"),
                ip: ip.to_string(),
                brand: "HPE".to_string(),
                snmp_version: version,
                community: None,
                auth_user: None,
                auth_pass: None,
                priv_pass: None,
                auth_proto: None,
                priv_proto: None,
                components: Vec::new(),
            },
            next_component_id: id * 100 + 1,
        }
    }

    /// Serveur v2c, community "public"
    pub fn v2c(id: DbId, ip: &str) -> Self {
        let mut builder = Self::base(id, ip, SnmpVersion::V2c);
        builder.target.community = Some("public".to_string());
        builder
    }

    /// Serveur v3 authPriv SHA/AES
    pub fn v3(id: DbId, ip: &str) -> Self {
        let mut builder = Self::base(id, ip, SnmpVersion::V3);
        builder.target.auth_user = Some("monitor".to_string());
        builder.target.auth_pass = Some("auth-passphrase".to_string());
        builder.target.priv_pass = Some("priv-passphrase".to_string());
        builder.target.auth_proto = Some("SHA".to_string());
        builder.target.priv_proto = Some("AES".to_string());
        builder
    }

    pub fn name(mut self, name: &str) -> Self {
        self.target.name = name.to_string();
        self
    }

    pub fn brand(mut self, brand: &str) -> Self {
        self.target.brand = brand.to_string();
        self
    }

    pub fn community(mut self, community: Option<&str>) -> Self {
        self.target.community = community.map(str::to_string);
        self
    }

    pub fn auth(mut self, user: &str, pass: &str, proto: &str) -> Self {
        self.target.auth_user = Some(user.to_string());
        self.target.auth_pass = Some(pass.to_string());
        self.target.auth_proto = Some(proto.to_string());
        self
    }

    pub fn privacy(mut self, pass: Option<&str>, proto: &str) -> Self {
        self.target.priv_pass = pass.map(str::to_string);
        self.target.priv_proto = Some(proto.to_string());
        self
    }

    pub fn component(mut self, name: &str, oid: &str, category: ComponentCategory) -> Self {
        self.target.components.push(Component {
            id: self.next_component_id,
            name: name.to_string(),
            oid: oid.to_string(),
            category,
        });
        self.next_component_id += 1;
        self
    }

    pub fn build(self) -> Target {
        self.target
    }
}
