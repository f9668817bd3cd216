/**
 * CLASSIFIER - Table déclarative marque × catégorie → règle
 *
 * RÔLE :
 * Transforme une valeur SNMP brute en statut de santé (OK / Warning /
 * Critical / Unknown) selon la marque du serveur et la catégorie du composant.
 *
 * FONCTIONNEMENT :
 * - ClassificationTable = données (désérialisable depuis kernel.yaml)
 * - Rule::Enumerated : jetons "nominal" / "dégradé", tout le reste → Critical
 * - Rule::Threshold : seuils bas/haut en intervalles semi-ouverts
 * - Une seule fonction d'évaluation, aucune branche par marque
 *
 * EXEMPLE kernel.yaml :
 * ```yaml
 * classification:
 *   brands:
 *     Lenovo:
 *       suhu: { kind: threshold, low: 45.0, high: 55.0 }
 * ```
 */

use crate::models::{ComponentCategory, HealthStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_FALLBACK_BRAND: &str = "custom";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    /// Comparaison insensible à la casse contre deux listes de jetons
    Enumerated { ok: Vec<String>, warning: Vec<String> },
    /// `v < low` → OK, `low <= v < high` → Warning, `v >= high` → Critical
    Threshold { low: f64, high: f64 },
}

impl Rule {
    pub fn enumerated(ok: &[&str], warning: &[&str]) -> Self {
        Self::Enumerated {
            ok: ok.iter().map(|t| t.to_lowercase()).collect(),
            warning: warning.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// `value` est déjà non vide
    fn evaluate(&self, value: &str) -> HealthStatus {
        match self {
            Rule::Enumerated { ok, warning } => {
                let token = value.trim().to_lowercase();
                if ok.iter().any(|t| t.eq_ignore_ascii_case(&token)) {
                    HealthStatus::Ok
                } else if warning.iter().any(|t| t.eq_ignore_ascii_case(&token)) {
                    HealthStatus::Warning
                } else {
                    HealthStatus::Critical
                }
            }
            Rule::Threshold { low, high } => match value.trim().parse::<f64>() {
                Ok(v) if v < *low => HealthStatus::Ok,
                Ok(v) if v < *high => HealthStatus::Warning,
                // NaN et lecture illisible : panne probable, pas absence de donnée
                _ => HealthStatus::Critical,
            },
        }
    }
}

pub type BrandRules = BTreeMap<ComponentCategory, Rule>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationTable {
    /// Marque utilisée quand celle du serveur n'est pas dans la table
    #[serde(default = "default_fallback_brand")]
    pub fallback_brand: String,
    #[serde(default)]
    pub brands: BTreeMap<String, BrandRules>,
}

fn default_fallback_brand() -> String {
    DEFAULT_FALLBACK_BRAND.to_string()
}

impl Default for ClassificationTable {
    fn default() -> Self {
        let ok = ["ok", "good", "1", "2"];
        let warning = ["warning", "degraded", "3"];
        let status = Rule::enumerated(&ok, &warning);

        let brand = |suhu: Rule| -> BrandRules {
            BrandRules::from([
                (ComponentCategory::Fan, status.clone()),
                (ComponentCategory::Psu, status.clone()),
                (ComponentCategory::Harddisk, status.clone()),
                (ComponentCategory::Suhu, suhu),
            ])
        };

        let mut brands = BTreeMap::new();
        brands.insert("HPE".to_string(), brand(Rule::Threshold { low: 50.0, high: 60.0 }));
        brands.insert("Dell".to_string(), brand(Rule::Threshold { low: 55.0, high: 65.0 }));
        brands.insert("supermicro".to_string(), brand(Rule::Threshold { low: 50.0, high: 60.0 }));
        // "custom" n'a pas de seuils : la température y est lue comme un état
        brands.insert(DEFAULT_FALLBACK_BRAND.to_string(), brand(status.clone()));

        Self { fallback_brand: default_fallback_brand(), brands }
    }
}

impl ClassificationTable {
    /// Ajoute/remplace des règles par marque. Une marque présente dans
    /// `overrides` ne remplace que les catégories qu'elle liste.
    pub fn merge(mut self, overrides: ClassificationTable) -> Self {
        for (brand, rules) in overrides.brands {
            self.brands.entry(brand).or_default().extend(rules);
        }
        self.fallback_brand = overrides.fallback_brand;
        self
    }

    pub fn rule_for(&self, brand: &str, category: ComponentCategory) -> Option<&Rule> {
        let rules = self
            .brands
            .get(brand)
            .or_else(|| self.brands.get(&self.fallback_brand))?;
        rules.get(&category)
    }

    /// Fonction pure : même triplet, même statut.
    pub fn classify(&self, brand: &str, category: ComponentCategory, raw: Option<&str>) -> HealthStatus {
        let value = match raw {
            Some(v) if !v.trim().is_empty() => v,
            _ => return HealthStatus::Unknown,
        };
        match self.rule_for(brand, category) {
            Some(rule) => rule.evaluate(value),
            // combinaison non couverte : considérée saine (comportement historique)
            None => HealthStatus::Ok,
        }
    }

    /// Vérifie que chaque seuil est croissant
    pub fn validate(&self) -> Result<(), String> {
        for (brand, rules) in &self.brands {
            for (category, rule) in rules {
                if let Rule::Threshold { low, high } = rule {
                    if !(low < high) {
                        return Err(format!(
                            "brand {brand}/{category}: low threshold {low} must be below high threshold {high}"
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
