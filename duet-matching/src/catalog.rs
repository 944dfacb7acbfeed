/// Interest tags a profile or preference set may carry.
pub const INTEREST_IDS: &[&str] = &[
    "soft_swap",
    "full_swap",
    "voyeur",
    "exhibitionist",
    "parties",
    "kink",
    "online",
    "friendship",
    "Viagens",
    "Jantares",
    "Cinema",
    "Massagens",
    "Festas",
    "Dança",
    "Cocktails",
    "Praia",
    "Vinho",
    "Golf",
    "Spa",
    "Leitura",
    "Natureza",
    "Surf",
    "Yoga",
    "Campismo",
    "Jogos",
    "Séries",
    "Culinária",
    "Tecnologia",
    "História",
    "Motos",
    "Rock",
    "Cerveja",
    "Fotografia",
    "Passeios",
    "Arte",
    "Museus",
    "Cruzeiros",
    "Dança de Salão",
    "Jantares Gourmet",
    "Desporto",
    "Saúde",
    "Fitness",
    "Campo",
    "Vinhos",
    "Gastronomia Alentejana",
    "Moda",
    "Design",
    "Festas Exclusivas",
    "Meditação",
    "Música",
    "Negócios",
    "Networking",
    "Gaming",
    "Música Eletrónica",
    // orientation tags
    "hetero_only",
    "she_bi",
    "he_bi",
    "both_bi",
    "same_gender",
];

pub const ORIENTATION_TAG_IDS: &[&str] =
    &["hetero_only", "she_bi", "he_bi", "both_bi", "same_gender"];

pub fn is_known_interest(id: &str) -> bool {
    INTEREST_IDS.contains(&id)
}

pub fn is_orientation_tag(id: &str) -> bool {
    ORIENTATION_TAG_IDS.contains(&id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_tags_are_interests() {
        assert!(ORIENTATION_TAG_IDS.iter().all(|id| is_known_interest(id)));
        assert!(is_orientation_tag("she_bi"));
        assert!(!is_orientation_tag("Surf"));
    }

    #[test]
    fn unknown_interest_rejected() {
        assert!(is_known_interest("Música Eletrónica"));
        assert!(!is_known_interest("musica"));
    }
}
